//! Error types shared by the world store and the transport

use shared::PlayerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("player {0} already exists")]
    DuplicatePlayer(PlayerId),

    #[error("server full ({0} clients)")]
    ServerFull(usize),

    #[error("unsupported client version {got} (expected {expected})")]
    VersionMismatch { got: u32, expected: u32 },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub type GameResult<T> = Result<T, GameError>;
