//! Uniform spatial hash over the food population
//!
//! Food is bucketed by `(floor(x / cell_size), floor(y / cell_size))` so a
//! collision query only has to look at the handful of cells under a
//! player's bounding box instead of every food item in the world. Cells
//! are dropped as soon as they become empty.

use shared::{cell_key, FoodId};
use std::collections::{HashMap, HashSet};

pub type CellKey = (i32, i32);

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, HashSet<FoodId>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn key_for(&self, x: f32, y: f32) -> CellKey {
        cell_key(x, y, self.cell_size)
    }

    /// Adds `id` to the cell under `(x, y)`. Inserting twice is a no-op.
    pub fn insert(&mut self, id: FoodId, x: f32, y: f32) {
        let key = self.key_for(x, y);
        self.cells.entry(key).or_default().insert(id);
    }

    /// Removes `id` from the cell under `(x, y)`; returns whether it was there.
    pub fn remove(&mut self, id: FoodId, x: f32, y: f32) -> bool {
        let key = self.key_for(x, y);
        let Some(cell) = self.cells.get_mut(&key) else {
            return false;
        };

        let removed = cell.remove(&id);
        if cell.is_empty() {
            self.cells.remove(&key);
        }
        removed
    }

    /// Every id stored in a cell that intersects `[min_x, max_x] × [min_y, max_y]`.
    pub fn query_region(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<FoodId> {
        let (min_cx, min_cy) = self.key_for(min_x, min_y);
        let (max_cx, max_cy) = self.key_for(max_x, max_y);

        let mut found = Vec::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    found.extend(cell.iter().copied());
                }
            }
        }
        found
    }

    pub fn cell(&self, key: CellKey) -> Option<&HashSet<FoodId>> {
        self.cells.get(&key)
    }

    /// Keys of every cell holding `id`. Outside of a bug this has at most one entry.
    pub fn cells_containing(&self, id: FoodId) -> Vec<CellKey> {
        self.cells
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total ids stored across all cells
    pub fn len(&self) -> usize {
        self.cells.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
