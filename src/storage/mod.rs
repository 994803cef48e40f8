//! Save storage
//!
//! A key-value port the session writes its snapshot through, with an
//! in-memory implementation for tests and a SQLite one for real games.

mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{GameError, GameResult};
use crate::state::GameState;

pub use sqlite::SqliteStore;

/// Key under which the game snapshot is saved unless configured otherwise
pub const DEFAULT_SAVE_KEY: &str = "dnd_game_state_agent";

#[async_trait]
pub trait SaveStore: Send + Sync {
    async fn get(&self, key: &str) -> GameResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> GameResult<()>;
    async fn clear(&self, key: &str) -> GameResult<()>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> GameResult<()> {
        Ok(())
    }
}

/// Store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveStore for MemoryStore {
    async fn get(&self, key: &str) -> GameResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> GameResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> GameResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Serialize `state` and store it under `key`
pub async fn save_snapshot(store: &dyn SaveStore, key: &str, state: &GameState) -> GameResult<()> {
    let json = serde_json::to_string(state)
        .map_err(|e| GameError::Storage(format!("serialize snapshot: {}", e)))?;
    store.set(key, &json).await?;
    debug!(key, bytes = json.len(), "Snapshot saved");
    Ok(())
}

/// Parse a stored snapshot, rejecting ones that break the state invariants
pub fn decode_snapshot(json: &str) -> GameResult<GameState> {
    let state: GameState = serde_json::from_str(json)
        .map_err(|e| GameError::CorruptSnapshot(e.to_string()))?;
    state.check_invariants().map_err(GameError::CorruptSnapshot)?;
    Ok(state)
}

/// Read the snapshot under `key`
///
/// Anything short of a valid snapshot reads as no save: backend errors and
/// corrupt payloads are logged and swallowed.
pub async fn load_snapshot(store: &dyn SaveStore, key: &str) -> Option<GameState> {
    let json = match store.get(key).await {
        Ok(Some(json)) => json,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read snapshot");
            return None;
        }
    };

    match decode_snapshot(&json) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(key, error = %e, "Ignoring unreadable snapshot");
            None
        }
    }
}
