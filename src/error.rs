//! Error taxonomy for the game core
//!
//! Only `InvalidNotation` is fatal to the operation that raised it. The other
//! kinds are recovered locally by the session: gateway failures degrade to a
//! fallback value, corrupt snapshots read as "no save", and illegal actions
//! become a system log entry.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    #[error("narrative gateway failure: {0}")]
    GatewayFailure(String),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("{0}")]
    IllegalAction(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl GameError {
    pub fn illegal(msg: impl Into<String>) -> Self {
        GameError::IllegalAction(msg.into())
    }
}

impl From<sqlx::Error> for GameError {
    fn from(e: sqlx::Error) -> Self {
        GameError::Storage(e.to_string())
    }
}

pub type GameResult<T> = Result<T, GameError>;
