//! Food items that agents consume for energy.
//!
//! Food is immutable once placed: it is created by the world and disappears
//! when an agent eats it or the world clears the field.

use geo::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A food item at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Food {
    /// Position in 2D space.
    pub pos: Point<f32>,
}

impl Food {
    /// Creates a food item at the given coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Point::new(x, y),
        }
    }

    /// Creates a food item at a random whole-unit position inside the world.
    pub fn new_random<R: Rng + ?Sized>(width: f32, height: f32, rng: &mut R) -> Self {
        Self::new(random_coord(width, rng), random_coord(height, rng))
    }

    /// Creates a food item at a random whole-unit position within `spread` of `center`.
    pub fn new_near<R: Rng + ?Sized>(center: (f32, f32), spread: f32, rng: &mut R) -> Self {
        let spread = spread.max(0.0).floor() as i32;
        let (cx, cy) = (center.0 as i32, center.1 as i32);
        Self::new(
            rng.random_range(cx - spread..=cx + spread) as f32,
            rng.random_range(cy - spread..=cy + spread) as f32,
        )
    }
}

/// Random whole-unit coordinate in `[0, extent - 1]`.
pub(crate) fn random_coord<R: Rng + ?Sized>(extent: f32, rng: &mut R) -> f32 {
    let upper = (extent as u32).max(1);
    rng.random_range(0..upper) as f32
}
