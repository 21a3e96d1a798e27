//! Authoritative game state and its state-transition functions
//!
//! `GameState` owns the world and an outbox of packets. The transport
//! calls `on_connect`, `on_move`, `on_eat_food`, `on_disconnect` and
//! `on_tick` one at a time and then drains the outbox, so the simulation
//! can be driven and inspected without a socket.

use crate::collision::{self, Consumption};
use crate::config::{MovementModel, ServerConfig};
use crate::error::GameResult;
use crate::movement;
use crate::world::World;
use log::{debug, info};
use shared::{
    distance, FoodId, Packet, Player, PlayerId, FOODS_PER_PACKET, MAX_NAME_LEN, TARGET_MARGIN,
};

/// A packet produced by the simulation, addressed by player id
#[derive(Debug, Clone)]
pub enum Outgoing {
    To {
        player_id: PlayerId,
        packet: Packet,
    },
    Broadcast {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

pub struct GameState {
    pub tick: u32,
    world: World,
    growth: f32,
    base_speed: f32,
    movement: MovementModel,
    outbox: Vec<Outgoing>,
}

impl GameState {
    /// Builds the world described by `config` and seeds the initial food
    pub fn new(config: &ServerConfig) -> Self {
        let mut world = match config.seed {
            Some(seed) => World::with_seed(config.width, config.height, config.cell_size, seed),
            None => World::new(config.width, config.height, config.cell_size),
        };
        world.populate(config.initial_food);

        Self {
            tick: 0,
            world,
            growth: config.growth,
            base_speed: config.base_speed_per_tick(),
            movement: config.movement,
            outbox: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Takes every packet queued since the last drain, in emission order
    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    fn send_to(&mut self, player_id: PlayerId, packet: Packet) {
        self.outbox.push(Outgoing::To { player_id, packet });
    }

    fn broadcast(&mut self, packet: Packet, exclude: Option<PlayerId>) {
        self.outbox.push(Outgoing::Broadcast { packet, exclude });
    }

    /// Creates the session's player, sends it the world and announces it
    pub fn on_connect(&mut self, player_id: PlayerId, name: Option<String>) -> GameResult<Player> {
        let name = display_name(player_id, name);
        let player = self.world.add_player(player_id, name)?;

        let snapshot = self.world.snapshot();
        let total_foods = snapshot.foods.len() as u32;
        let mut chunks = snapshot.foods.chunks(FOODS_PER_PACKET);
        let first = chunks.next().map(<[_]>::to_vec).unwrap_or_default();

        self.send_to(
            player_id,
            Packet::WorldInit {
                you: player.clone(),
                players: snapshot.players,
                foods: first,
                width: self.world.width(),
                height: self.world.height(),
                total_foods,
            },
        );
        for chunk in chunks {
            self.send_to(
                player_id,
                Packet::FoodBatch {
                    foods: chunk.to_vec(),
                },
            );
        }

        self.broadcast(
            Packet::PlayerJoined {
                player: player.clone(),
            },
            Some(player_id),
        );

        info!("Player {} joined ({} online)", player_id, self.world.player_count());
        Ok(player)
    }

    /// Removes the session's player and tells everyone else
    pub fn on_disconnect(&mut self, player_id: PlayerId) {
        if self.world.remove_player(player_id).is_some() {
            self.broadcast(Packet::PlayerLeft { player_id }, None);
            info!("Player {} left ({} online)", player_id, self.world.player_count());
        }
    }

    /// Records a move; malformed or unknown-session moves are dropped
    pub fn on_move(&mut self, player_id: PlayerId, x: f32, y: f32) {
        if !self.target_in_range(x, y) {
            debug!("Dropping invalid move ({}, {}) from {}", x, y, player_id);
            return;
        }

        let (width, height) = (self.world.width(), self.world.height());
        let base_speed = self.base_speed;
        let model = self.movement;

        let Some(player) = self.world.player_mut(player_id) else {
            debug!("Dropping move for unknown player {}", player_id);
            return;
        };

        match model {
            MovementModel::Seek => player.target = Some((x, y)),
            MovementModel::Direct => {
                if !movement::apply_direct(player, x, y, base_speed, width, height) {
                    debug!("Rejected direct move of player {} to ({}, {})", player_id, x, y);
                }
            }
        }
    }

    fn target_in_range(&self, x: f32, y: f32) -> bool {
        x.is_finite()
            && y.is_finite()
            && x >= -TARGET_MARGIN
            && y >= -TARGET_MARGIN
            && x <= self.world.width() + TARGET_MARGIN
            && y <= self.world.height() + TARGET_MARGIN
    }

    /// Client-reported eating; credited only if the food exists and is in reach
    pub fn on_eat_food(&mut self, player_id: PlayerId, food_id: FoodId) -> bool {
        let in_reach = match (self.world.player(player_id), self.world.food(food_id)) {
            (Some(player), Some(food)) => {
                distance(player.x, player.y, food.x, food.y) < player.radius + food.radius
            }
            _ => false,
        };
        if !in_reach {
            debug!("Ignoring eat of food {} by player {}", food_id, player_id);
            return false;
        }

        match collision::consume(&mut self.world, player_id, food_id, self.growth) {
            Some(consumption) => {
                self.publish_consumption(consumption);
                true
            }
            None => false,
        }
    }

    fn publish_consumption(&mut self, consumption: Consumption) {
        self.broadcast(
            Packet::FoodConsumed {
                food_id: consumption.food_id,
                player_id: consumption.player_id,
            },
            None,
        );
        self.broadcast(
            Packet::FoodSpawned {
                food: consumption.replacement,
            },
            None,
        );
    }

    /// One simulation step: movement, consumption, then the player broadcast
    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);

        movement::advance(&mut self.world, self.base_speed);

        for consumption in collision::resolve(&mut self.world, self.growth) {
            self.publish_consumption(consumption);
        }

        self.broadcast(
            Packet::WorldUpdate {
                tick: self.tick,
                players: self.world.player_list(),
            },
            None,
        );

        if self.tick % 300 == 0 {
            debug!(
                "Tick {}: {} players, {} food",
                self.tick,
                self.world.player_count(),
                self.world.food_count()
            );
        }
    }
}

/// Uses the client's name when it is usable, `Player_<id>` otherwise
pub fn display_name(player_id: PlayerId, requested: Option<String>) -> String {
    requested
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && name.chars().count() <= MAX_NAME_LEN)
        .unwrap_or_else(|| format!("Player_{:04}", player_id))
}
