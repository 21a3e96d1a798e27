use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

pub const WORLD_WIDTH: f32 = 5000.0;
pub const WORLD_HEIGHT: f32 = 5000.0;
pub const FOOD_CELL_SIZE: f32 = 100.0;

pub const PLAYER_START_RADIUS: f32 = 20.0;
/// Radius at which a player moves at exactly the base speed.
pub const RADIUS_UNIT: f32 = 20.0;
pub const FOOD_RADIUS: f32 = 5.0;

/// Seek targets further than this outside the world are rejected.
pub const TARGET_MARGIN: f32 = 500.0;
/// Seek movement stops once the target is this close.
pub const ARRIVAL_DISTANCE: f32 = 1.0;

/// Foods carried by a single `WorldInit` or `FoodBatch` datagram.
pub const FOODS_PER_PACKET: usize = 512;
pub const MAX_NAME_LEN: usize = 16;
pub const MAX_PACKET_SIZE: usize = 65_536;

pub type PlayerId = u32;
pub type FoodId = u64;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: Option<String>,
    },
    Move {
        x: f32,
        y: f32,
    },
    EatFood {
        food_id: FoodId,
    },
    Heartbeat,
    Disconnect,

    WorldInit {
        you: Player,
        players: Vec<Player>,
        foods: Vec<Food>,
        width: f32,
        height: f32,
        total_foods: u32,
    },
    FoodBatch {
        foods: Vec<Food>,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    WorldUpdate {
        tick: u32,
        players: Vec<Player>,
    },
    FoodSpawned {
        food: Food,
    },
    FoodConsumed {
        food_id: FoodId,
        player_id: PlayerId,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hue: u16,
    pub name: String,
    pub score: u32,
    /// Seek target, known only to the server.
    #[serde(skip)]
    pub target: Option<(f32, f32)>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, x: f32, y: f32, hue: u16) -> Self {
        Self {
            id,
            x,
            y,
            radius: PLAYER_START_RADIUS,
            hue,
            name,
            score: 0,
            target: None,
        }
    }

    /// Axis-aligned box `(min_x, min_y, max_x, max_y)` around the circle.
    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.x - self.radius,
            self.y - self.radius,
            self.x + self.radius,
            self.y + self.radius,
        )
    }

    /// Per-tick speed; larger players are slower.
    pub fn speed(&self, base_speed: f32) -> f32 {
        base_speed / (self.radius / RADIUS_UNIT)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.radius.is_finite()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Food {
    pub id: FoodId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hue: u16,
}

impl Food {
    pub fn new(id: FoodId, x: f32, y: f32, hue: u16) -> Self {
        Self {
            id,
            x,
            y,
            radius: FOOD_RADIUS,
            hue,
        }
    }
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

/// Clamps a circle centre so the whole circle stays inside `width × height`.
pub fn clamp_to_bounds(x: f32, y: f32, radius: f32, width: f32, height: f32) -> (f32, f32) {
    // max/min rather than f32::clamp, which panics when radius > dimension / 2
    (
        x.max(radius).min(width - radius),
        y.max(radius).min(height - radius),
    )
}

pub fn cell_key(x: f32, y: f32, cell_size: f32) -> (i32, i32) {
    (
        (x / cell_size).floor() as i32,
        (y / cell_size).floor() as i32,
    )
}
