//! Game API - command surface, state, log and combat tracker

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::log::LogEntry;
use crate::session::Command;
use crate::state::{Enemy, PartySharedData, PlayerCharacter, Scene};

/// Build the game router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/command", post(command))
        .route("/reset", post(reset))
        .route("/state", get(state_view))
        .route("/log", get(log))
        .route("/tracker", get(tracker))
}

/// A verb from the client
#[derive(Debug, Deserialize)]
struct CommandRequest {
    verb: String,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    /// False for verbs the game does not know
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Log entries appended while the command ran
    entries: Vec<LogEntry>,
    revision: u64,
}

/// Run a command and report what it added to the log
async fn command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let session = &state.session;
    let before = session.last_log_id();

    let Some(command) = Command::parse(&req.verb, req.target.as_deref()) else {
        debug!(verb = %req.verb, "Ignoring unknown verb");
        return Json(CommandResponse {
            accepted: false,
            error: None,
            entries: Vec::new(),
            revision: session.revision(),
        });
    };

    let error = session.handle(command).await.err().map(|e| e.to_string());
    Json(CommandResponse {
        accepted: true,
        error,
        entries: session.log_since(before),
        revision: session.revision(),
    })
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    revision: u64,
}

/// Start a fresh campaign
async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.session.reset();
    Json(ResetResponse {
        revision: state.session.revision(),
    })
}

/// What the player may see of the game state
#[derive(Debug, Serialize)]
struct StateView {
    session_id: String,
    campaign_name: String,
    current_scene: Scene,
    player_characters: BTreeMap<String, PlayerCharacter>,
    enemies: BTreeMap<String, Enemy>,
    party_shared_data: PartySharedData,
    revision: u64,
    in_combat: bool,
    is_player_turn: bool,
    busy: bool,
}

async fn state_view(State(state): State<AppState>) -> impl IntoResponse {
    let session = &state.session;
    let game = session.snapshot();
    Json(StateView {
        session_id: game.session_id.clone(),
        campaign_name: game.campaign_name.clone(),
        current_scene: game.scene.clone(),
        player_characters: game.player_characters.clone(),
        enemies: game.enemies.clone(),
        party_shared_data: game.party_shared_data.clone(),
        revision: session.revision(),
        in_combat: game.in_combat(),
        is_player_turn: game.is_player_turn(),
        busy: session.is_busy(),
    })
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    #[serde(default)]
    since: u64,
}

/// Log entries after `since` (all of them by default)
async fn log(State(state): State<AppState>, Query(params): Query<LogQuery>) -> impl IntoResponse {
    Json(state.session.log_since(params.since))
}

async fn tracker(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.tracker())
}
