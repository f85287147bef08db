//! Spatial indexing for food queries.
//!
//! [`FoodField`] owns the food items of the world and a KD-tree over their
//! positions. The tree is rebuilt lazily after the item list changes, so the
//! queries of a tick always see food eaten earlier in the same tick.

use geo::Point;
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::food::Food;

/// Type alias for 2D spatial KD-tree used for efficient neighbor queries.
pub type Tree2D = KdTree<f32, usize, [f32; 2]>;

/// The food on the board together with its lazily built index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodField {
    items: Vec<Food>,
    #[serde(skip)]
    tree: Option<Tree2D>,
}

impl FoodField {
    /// Creates an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// All food items in insertion order.
    pub fn items(&self) -> &[Food] {
        &self.items
    }

    /// Number of food items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the field holds no food.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a food item.
    pub fn push(&mut self, food: Food) {
        self.items.push(food);
        self.tree = None;
    }

    /// Adds several food items.
    pub fn extend(&mut self, food: impl IntoIterator<Item = Food>) {
        self.items.extend(food);
        self.tree = None;
    }

    /// Removes and returns the item at `idx`.
    pub fn remove(&mut self, idx: usize) -> Food {
        self.tree = None;
        self.items.remove(idx)
    }

    /// Removes all food.
    pub fn clear(&mut self) {
        self.items.clear();
        self.tree = None;
    }

    /// Index and copy of the food item closest to `pos`, if any.
    pub fn nearest(&mut self, pos: Point<f32>) -> Result<Option<(usize, Food)>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        let found = self
            .index()?
            .nearest(&[pos.x(), pos.y()], 1, &squared_euclidean)?
            .first()
            .map(|(_, idx)| **idx);
        Ok(found.map(|idx| (idx, self.items[idx])))
    }

    /// Number of food items strictly closer than `radius` to `pos`.
    pub fn count_within(&mut self, pos: Point<f32>, radius: f32) -> Result<usize> {
        if self.items.is_empty() {
            return Ok(0);
        }
        let radius_sq = radius * radius;
        let count = self
            .index()?
            .within(&[pos.x(), pos.y()], radius_sq, &squared_euclidean)?
            .into_iter()
            .filter(|(dist_sq, _)| *dist_sq < radius_sq)
            .count();
        Ok(count)
    }

    fn index(&mut self) -> Result<&Tree2D> {
        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => build_tree(&self.items)?,
        };
        Ok(&*self.tree.insert(tree))
    }
}

/// Helper function to build a KD-tree from the food positions.
fn build_tree(items: &[Food]) -> Result<Tree2D> {
    let mut tree = KdTree::new(2);
    for (i, item) in items.iter().enumerate() {
        tree.add([item.pos.x(), item.pos.y()], i)?;
    }
    Ok(tree)
}
