//! Food consumption
//!
//! Each tick every player's bounding box is looked up in the food grid and
//! the candidates are tested against the player's circle. A food id is
//! re-checked against the store before it is credited, so an item eaten
//! earlier in the same pass can never be credited twice.

use crate::world::World;
use log::{debug, warn};
use shared::{distance, Food, FoodId, PlayerId};

/// One food item eaten by one player, with the food spawned to replace it
#[derive(Debug, Clone, PartialEq)]
pub struct Consumption {
    pub player_id: PlayerId,
    pub food_id: FoodId,
    pub replacement: Food,
}

/// Credits `player_id` with `food_id` if both still exist.
///
/// Removes the food from the store and grid, grows the player and spawns
/// exactly one replacement. Returns `None` for stale ids.
pub fn consume(
    world: &mut World,
    player_id: PlayerId,
    food_id: FoodId,
    growth: f32,
) -> Option<Consumption> {
    if world.player(player_id).is_none() {
        return None;
    }
    world.remove_food(food_id)?;

    if let Some(player) = world.player_mut(player_id) {
        player.score += 1;
        player.radius += growth;
    }

    let replacement = world.spawn_food();
    Some(Consumption {
        player_id,
        food_id,
        replacement,
    })
}

/// Food ids indexed near `player_id`'s bounding box, in ascending id order.
pub fn candidate_food(world: &World, player_id: PlayerId) -> Vec<FoodId> {
    let Some(player) = world.player(player_id) else {
        return Vec::new();
    };

    let (min_x, min_y, max_x, max_y) = player.get_bounds();
    let mut candidates = world.food_near(min_x, min_y, max_x, max_y);
    candidates.sort_unstable();
    candidates
}

/// True if the food lies strictly inside the player's current circle.
pub fn touches(world: &World, player_id: PlayerId, food_id: FoodId) -> bool {
    match (world.player(player_id), world.food(food_id)) {
        (Some(player), Some(food)) => {
            distance(player.x, player.y, food.x, food.y) < player.radius
        }
        _ => false,
    }
}

/// Resolves every player-food overlap for one tick.
///
/// Each candidate is tested against the radius the player has at that
/// point, so food brought into reach by an earlier bite is eaten in the
/// same pass.
pub fn resolve(world: &mut World, growth: f32) -> Vec<Consumption> {
    let mut consumed = Vec::new();

    for player_id in world.player_ids() {
        let valid = world.player(player_id).map(|p| p.is_finite()).unwrap_or(false);
        if !valid {
            warn!("Skipping collision check for player {}", player_id);
            continue;
        }

        for food_id in candidate_food(world, player_id) {
            // Stale ids were eaten earlier in this pass
            if !touches(world, player_id, food_id) {
                continue;
            }
            if let Some(consumption) = consume(world, player_id, food_id, growth) {
                debug!("Player {} ate food {}", player_id, food_id);
                consumed.push(consumption);
            }
        }
    }

    consumed
}
