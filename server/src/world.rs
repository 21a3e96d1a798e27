//! Canonical store of every player and food item
//!
//! The food map and the spatial grid are two views of the same data and
//! are only ever changed together, inside `spawn_food` and `remove_food`.
//! Outside code gets read-only access to the grid.

use crate::error::{GameError, GameResult};
use crate::spatial::SpatialGrid;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Food, FoodId, Player, PlayerId, FOOD_RADIUS, PLAYER_START_RADIUS};
use std::collections::HashMap;

/// Point-in-time copy of the world used for initial sync
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub players: Vec<Player>,
    pub foods: Vec<Food>,
}

#[derive(Debug)]
pub struct World {
    width: f32,
    height: f32,
    players: HashMap<PlayerId, Player>,
    foods: HashMap<FoodId, Food>,
    grid: SpatialGrid,
    next_food_id: FoodId,
    rng: StdRng,
}

impl World {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        Self::with_rng(width, height, cell_size, StdRng::from_entropy())
    }

    /// Builds a world whose spawn positions are reproducible
    pub fn with_seed(width: f32, height: f32, cell_size: f32, seed: u64) -> Self {
        Self::with_rng(width, height, cell_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: f32, height: f32, cell_size: f32, rng: StdRng) -> Self {
        Self {
            width,
            height,
            players: HashMap::new(),
            foods: HashMap::new(),
            grid: SpatialGrid::new(cell_size),
            next_food_id: 1,
            rng,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    fn random_position(&mut self, radius: f32) -> (f32, f32) {
        let x = self.random_coordinate(radius, self.width);
        let y = self.random_coordinate(radius, self.height);
        (x, y)
    }

    fn random_coordinate(&mut self, radius: f32, extent: f32) -> f32 {
        if extent - radius > radius {
            self.rng.gen_range(radius..=extent - radius)
        } else {
            extent / 2.0
        }
    }

    fn random_hue(&mut self) -> u16 {
        self.rng.gen_range(0..360)
    }

    /// Creates a player at a random in-bounds position
    pub fn add_player(&mut self, id: PlayerId, name: String) -> GameResult<Player> {
        if self.players.contains_key(&id) {
            return Err(GameError::DuplicatePlayer(id));
        }

        let (x, y) = self.random_position(PLAYER_START_RADIUS);
        let hue = self.random_hue();
        let player = Player::new(id, name, x, y, hue);

        info!("Added player {} ({}) at ({:.1}, {:.1})", id, player.name, x, y);
        self.players.insert(id, player.clone());
        Ok(player)
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Player ids in ascending order, for deterministic passes
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Spawns one food item and indexes it in the grid
    pub fn spawn_food(&mut self) -> Food {
        let id = self.next_food_id;
        self.next_food_id += 1;

        let (x, y) = self.random_position(FOOD_RADIUS);
        let hue = self.random_hue();
        let food = Food::new(id, x, y, hue);

        self.grid.insert(id, x, y);
        self.foods.insert(id, food.clone());
        food
    }

    /// Bulk spawn used to seed the world at startup
    pub fn populate(&mut self, count: usize) {
        for _ in 0..count {
            self.spawn_food();
        }
        info!("Spawned {} food items", count);
    }

    /// Removes food from both the map and the grid; `None` if already gone
    pub fn remove_food(&mut self, id: FoodId) -> Option<Food> {
        let food = self.foods.remove(&id)?;
        if !self.grid.remove(id, food.x, food.y) {
            debug!("Food {} was missing from its grid cell", id);
        }
        Some(food)
    }

    pub fn food(&self, id: FoodId) -> Option<&Food> {
        self.foods.get(&id)
    }

    pub fn foods(&self) -> impl Iterator<Item = &Food> {
        self.foods.values()
    }

    pub fn food_count(&self) -> usize {
        self.foods.len()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Food ids whose grid cells intersect the given rectangle
    pub fn food_near(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<FoodId> {
        self.grid.query_region(min_x, min_y, max_x, max_y)
    }

    /// Copies every entity; players and foods are sorted by id
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_unstable_by_key(|p| p.id);
        let mut foods: Vec<Food> = self.foods.values().cloned().collect();
        foods.sort_unstable_by_key(|f| f.id);
        WorldSnapshot { players, foods }
    }

    /// Sorted list of players for the periodic broadcast
    pub fn player_list(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_unstable_by_key(|p| p.id);
        players
    }

    #[cfg(test)]
    pub(crate) fn insert_food_at(&mut self, x: f32, y: f32) -> Food {
        let id = self.next_food_id;
        self.next_food_id += 1;
        let food = Food::new(id, x, y, 0);
        self.grid.insert(id, x, y);
        self.foods.insert(id, food.clone());
        food
    }

    /// Checks that grid and food map agree exactly
    #[cfg(test)]
    pub(crate) fn assert_index_consistent(&self) {
        for food in self.foods.values() {
            let key = self.grid.key_for(food.x, food.y);
            assert_eq!(
                self.grid.cells_containing(food.id),
                vec![key],
                "food {} indexed in the wrong cells",
                food.id
            );
        }
        assert_eq!(self.grid.len(), self.foods.len());
    }
}
