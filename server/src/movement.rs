//! Per-tick player movement
//!
//! Players seek toward the last target their client reported. Speed is
//! inversely proportional to radius and every step ends with a clamp into
//! the world, so a single tick can never move a player further than its
//! speed or outside the bounds.

use crate::world::World;
use log::warn;
use shared::{clamp_to_bounds, distance, Player, ARRIVAL_DISTANCE};

/// Slack applied to the per-tick speed when validating direct positions.
pub const DIRECT_MOVE_SLACK: f32 = 3.0;

/// Advances a single player one tick toward its target and clamps it.
pub fn step_player(player: &mut Player, base_speed: f32, width: f32, height: f32) {
    if let Some((target_x, target_y)) = player.target {
        let dx = target_x - player.x;
        let dy = target_y - player.y;
        let dist = distance(player.x, player.y, target_x, target_y);

        if dist > ARRIVAL_DISTANCE {
            let step = player.speed(base_speed).min(dist);
            player.x += dx / dist * step;
            player.y += dy / dist * step;
        }
    }

    let (x, y) = clamp_to_bounds(player.x, player.y, player.radius, width, height);
    player.x = x;
    player.y = y;
}

/// Moves every player in the world by one tick.
pub fn advance(world: &mut World, base_speed: f32) {
    let (width, height) = (world.width(), world.height());

    for player in world.players_mut() {
        if !player.is_finite() {
            warn!("Skipping player {} with invalid state", player.id);
            continue;
        }
        step_player(player, base_speed, width, height);
    }
}

/// Applies a client-reported position if it is reachable from the current one.
///
/// Returns false and leaves the player untouched when the jump is larger
/// than `DIRECT_MOVE_SLACK` ticks of movement.
pub fn apply_direct(
    player: &mut Player,
    x: f32,
    y: f32,
    base_speed: f32,
    width: f32,
    height: f32,
) -> bool {
    let max_step = player.speed(base_speed) * DIRECT_MOVE_SLACK;
    if distance(player.x, player.y, x, y) > max_step {
        return false;
    }

    let (x, y) = clamp_to_bounds(x, y, player.radius, width, height);
    player.x = x;
    player.y = y;
    true
}
