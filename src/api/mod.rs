//! HTTP API module - command surface and read-only views

mod game;
mod images;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::Session;
use crate::storage::SaveStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub store: Arc<dyn SaveStore>,
}

/// Build the API router
pub fn router(session: Arc<Session>, store: Arc<dyn SaveStore>) -> Router {
    let state = AppState { session, store };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(game::router())
        .merge(images::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "narrator",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                storage: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                storage: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: &'static str,
}
