//! # Arena Server Library
//!
//! This library provides the authoritative server for a multiplayer
//! "grow-by-eating" arena. Players steer a circle around a bounded world,
//! eat food pellets to grow, and every client is kept in sync with the
//! server's canonical state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients only report where they want to go. The server integrates
//! movement, detects which food each player touches, and decides who gets
//! credit. A food item can be eaten exactly once no matter how many
//! players overlap it in the same tick.
//!
//! ### Session Management
//! Each connection owns exactly one player. Joining sends the new client
//! the full world and announces it to everyone else; leaving (explicitly
//! or by timeout) removes the player and announces that too.
//!
//! ### State Broadcasting
//! Players are few, so the full player list goes out every tick. Food is
//! plentiful, so it is only sent once on join and then as individual
//! spawn/consume events.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the `GameState` and interleaves inbound packets with the
//! tick timer. Handlers and ticks never overlap, so the world needs no
//! locks and the consumption check is race free.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded `shared::Packet` values over UDP. Separate
//! tasks receive datagrams, send datagrams and watch for silent clients.
//!
//! ## Module Organization
//!
//! - `spatial`: uniform hash grid over food positions
//! - `world`: canonical players and food, keeps the grid in sync
//! - `movement`: per-tick seek movement and bounds clamping
//! - `collision`: food consumption with at-most-once crediting
//! - `game`: state-transition functions and the outbound packet queue
//! - `client_manager`: address to player bookkeeping, timeouts, rate limits
//! - `network`: UDP transport and the tick loop
//! - `config`: command-line configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs until a Shutdown message arrives
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The simulation can also be driven without a socket:
//!
//! ```rust
//! use server::config::ServerConfig;
//! use server::game::GameState;
//!
//! let mut config = ServerConfig::default();
//! config.initial_food = 10;
//! let mut game = GameState::new(&config);
//!
//! game.on_connect(1, None).unwrap();
//! game.on_move(1, 2500.0, 2500.0);
//! game.on_tick();
//!
//! assert_eq!(game.world().food_count(), 10);
//! assert!(!game.drain_outgoing().is_empty());
//! ```

pub mod client_manager;
pub mod collision;
pub mod config;
pub mod error;
pub mod game;
pub mod movement;
pub mod network;
pub mod spatial;
pub mod world;
