//! Geometric utility functions for distance calculations and boundary handling.

use geo::algorithm::Distance;
use geo::{Euclidean, Point};

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point<f32>, b: Point<f32>) -> f32 {
    Euclidean.distance(a, b)
}

/// Distance from `pos` to the closest edge of a `width` × `height` box.
pub fn edge_distance(pos: Point<f32>, width: f32, height: f32) -> f32 {
    pos.x()
        .min(width - pos.x())
        .min(pos.y())
        .min(height - pos.y())
}

/// Clamps a position into `[0, max_x] × [0, max_y]`.
pub fn clamp_to_box(pos: Point<f32>, max_x: f32, max_y: f32) -> Point<f32> {
    Point::new(pos.x().clamp(0.0, max_x), pos.y().clamp(0.0, max_y))
}
