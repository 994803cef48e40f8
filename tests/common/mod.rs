//! Common test utilities - NarratorTest harness and in-process session builders

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use narrator::combat::ScriptedDice;
use narrator::config::Pacing;
use narrator::narrative::ScriptedGateway;
use narrator::state::{initial_state, GameState};
use narrator::storage::{MemoryStore, SaveStore};
use narrator::{Config, Server, Session};
use reqwest::Client;
use tokio::task::JoinHandle;

/// Test harness that spawns a real narrator server on a random port
pub struct NarratorTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl NarratorTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            db_path: None, // In-memory for tests
            seed: Some(7),
            pacing: Pacing {
                turn_delay_ms: 10,
                advance_delay_ms: 0,
            },
            ..Config::default()
        };

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request and parse the JSON body
    pub async fn get(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?
            .json()
            .await?)
    }

    /// POST a command verb and parse the JSON body
    pub async fn command(&self, verb: &str, target: Option<&str>) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "verb": verb, "target": target });
        Ok(self
            .client
            .post(format!("{}/command", self.base_url()))
            .json(&body)
            .send()
            .await?
            .json()
            .await?)
    }

    /// Poll the state view until it is the player's turn with nothing pending
    pub async fn wait_for_player_turn(&self) -> Result<serde_json::Value> {
        for _ in 0..100 {
            let state = self.get("/state").await?;
            if state["is_player_turn"] == true && state["busy"] == false {
                return Ok(state);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("player turn never came round")
    }

    /// Direct access to the game session
    pub fn session(&self) -> Arc<Session> {
        self.server.session()
    }
}

impl Drop for NarratorTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// An in-process session with scripted dice and narration
pub fn scripted_session(
    state: GameState,
    rolls: &[u32],
    gateway: Arc<ScriptedGateway>,
    store: Arc<dyn SaveStore>,
) -> Arc<Session> {
    Arc::new(
        Session::new(
            state,
            Box::new(ScriptedDice::new(rolls.iter().copied())),
            gateway,
            store,
        )
        .with_advance_delay(Duration::ZERO),
    )
}

/// The default campaign with an in-memory store
pub fn fresh_session(rolls: &[u32], gateway: Arc<ScriptedGateway>) -> Arc<Session> {
    scripted_session(initial_state(), rolls, gateway, Arc::new(MemoryStore::new()))
}

/// Contents of every log entry, oldest first
pub fn log_lines(session: &Session) -> Vec<String> {
    session
        .log_entries()
        .into_iter()
        .map(|e| e.content)
        .collect()
}
