//! Process-wide server configuration
//!
//! Every tunable is fixed at startup and parsed from the command line.
//! `ServerConfig::default()` is identical to launching with no arguments,
//! which keeps tests and the binary on the same defaults.

use clap::{Parser, ValueEnum};
use shared::{FOOD_CELL_SIZE, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::Duration;

/// How `Move` packets are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MovementModel {
    /// The client sends a target and the server integrates toward it
    Seek,
    /// The client sends its own position, accepted within a speed bound
    Direct,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Authoritative arena game server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = 30)]
    pub tick_rate: u32,

    /// World width in world units
    #[arg(long, default_value_t = WORLD_WIDTH)]
    pub width: f32,

    /// World height in world units
    #[arg(long, default_value_t = WORLD_HEIGHT)]
    pub height: f32,

    /// Edge length of a food grid cell
    #[arg(long, default_value_t = FOOD_CELL_SIZE)]
    pub cell_size: f32,

    /// Food items spawned at startup
    #[arg(long, default_value_t = 1000)]
    pub initial_food: usize,

    /// Radius gained per food eaten
    #[arg(long, default_value_t = 0.5)]
    pub growth: f32,

    /// Movement speed in units per second for a player of radius 20
    #[arg(long, default_value_t = 600.0)]
    pub base_speed: f32,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value_t = 64)]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value_t = 5)]
    pub client_timeout_secs: u64,

    /// Move packets accepted per client per second
    #[arg(long, default_value_t = 20)]
    pub max_moves_per_sec: u32,

    /// How move packets are interpreted
    #[arg(long, value_enum, default_value_t = MovementModel::Seek)]
    pub movement: MovementModel,

    /// Fixed RNG seed for reproducible spawns
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    /// Base speed converted to units per tick
    pub fn base_speed_per_tick(&self) -> f32 {
        self.base_speed / self.tick_rate.max(1) as f32
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    /// Minimum spacing between two accepted move packets of one client
    pub fn move_interval(&self) -> Duration {
        if self.max_moves_per_sec == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(1.0 / f64::from(self.max_moves_per_sec))
    }
}
