//! narrator - turn-based combat core for a narrated tabletop adventure
//!
//! A D&D-style skirmish engine: initiative, turns, attacks and enemy AI, with
//! an external text and image generator narrating what happens.

pub mod api;
pub mod combat;
pub mod config;
pub mod error;
pub mod log;
pub mod narrative;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::Config;
pub use error::{GameError, GameResult};
pub use session::{Command, Session};

use combat::{Dice, RngDice};
use narrative::{ChatGateway, NarrativeGateway, OfflineGateway};
use storage::{SaveStore, SqliteStore};

/// Open the save store named by the config (in-memory without a path)
pub async fn open_store(config: &Config) -> GameResult<Arc<dyn SaveStore>> {
    let store = SqliteStore::new(config.db_path.as_deref()).await?;
    Ok(Arc::new(store))
}

/// Pick the narrative gateway: the HTTP service when a key is set, offline otherwise
pub fn build_gateway(config: &Config) -> GameResult<Arc<dyn NarrativeGateway>> {
    if config.gateway.is_configured() {
        info!(base_url = %config.gateway.base_url, "Using narrative service");
        Ok(Arc::new(ChatGateway::new(config.gateway.clone())?))
    } else {
        info!("No narrative service key configured, narrating offline");
        Ok(Arc::new(OfflineGateway))
    }
}

/// A fresh session wired up from the config
pub fn build_session(config: &Config, store: Arc<dyn SaveStore>) -> GameResult<Session> {
    let dice: Box<dyn Dice> = match config.seed {
        Some(seed) => Box::new(RngDice::seeded(seed)),
        None => Box::new(RngDice::from_entropy()),
    };
    let gateway = build_gateway(config)?;

    Ok(Session::new(state::initial_state(), dice, gateway, store)
        .with_save_key(config.save_key.clone())
        .with_advance_delay(config.pacing.advance_delay()))
}

/// The narrator HTTP server instance
pub struct Server {
    config: Config,
    session: Arc<Session>,
    store: Arc<dyn SaveStore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let store = open_store(&config).await?;
        let session = Arc::new(build_session(&config, store.clone())?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            session,
            store,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the game session
    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.session.clone(), self.store.clone())
    }

    /// Run the server and the turn scheduler until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("narrator listening on {}", local_addr);

        let scheduler = scheduler::spawn_turn_scheduler(
            self.session.clone(),
            self.config.pacing.turn_delay(),
            self.shutdown_rx.clone(),
        );

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        scheduler.await?;
        info!("narrator shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
