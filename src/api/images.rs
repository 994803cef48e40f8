//! Scene image endpoint
//!
//! GET /image - The last generated picture of the scene, if any

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new().route("/image", get(get_image))
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    /// Remote URL or data URL
    image: Option<String>,
    pending: bool,
}

async fn get_image(State(state): State<AppState>) -> impl IntoResponse {
    Json(ImageResponse {
        image: state.session.scene_image(),
        pending: state.session.is_busy(),
    })
}
