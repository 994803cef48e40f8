//! Layered configuration
//!
//! Built-in defaults, then `narrator.toml` (or the file given with
//! `--config`), then `NARRATOR_*` environment variables. Nested keys use a
//! double underscore: `NARRATOR_PACING__TURN_DELAY_MS=500`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::narrative::GatewayConfig;
use crate::storage::DEFAULT_SAVE_KEY;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "narrator.toml";

/// Delays that pace the enemy side of combat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Pause before an enemy acts
    pub turn_delay_ms: u64,
    /// Pause between an enemy's attack and the turn passing on
    pub advance_delay_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            turn_delay_ms: 1500,
            advance_delay_ms: 100,
        }
    }
}

impl Pacing {
    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.turn_delay_ms)
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// SQLite save file; None = in-memory
    pub db_path: Option<String>,
    pub save_key: String,
    /// Fixed dice seed for reproducible games
    pub seed: Option<u64>,
    pub gateway: GatewayConfig,
    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            save_key: DEFAULT_SAVE_KEY.to_string(),
            seed: None,
            gateway: GatewayConfig::default(),
            pacing: Pacing::default(),
        }
    }
}

impl Config {
    /// Load from defaults, a TOML file and the environment
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Ok(Self::figment(path)?.extract()?)
    }

    fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        }
        Ok(figment.merge(Env::prefixed("NARRATOR_").split("__")))
    }
}
