//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let camera_ok = state.frame_source.check().await;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        camera_connected: camera_ok,
        subscribers: state.hub.subscriber_count(),
        history_len: state.history.len().await,
    };

    Json(response)
}

/// Camera status endpoint
pub async fn camera_status(State(state): State<AppState>) -> impl IntoResponse {
    let target = state.frame_source.target().await;
    let connected = state.frame_source.check().await;

    if connected {
        Json(json!({
            "connected": true,
            "capture_url": target,
        }))
    } else {
        Json(json!({
            "connected": false,
            "capture_url": target,
            "error": "Cannot reach camera. Check the capture URL and network.",
        }))
    }
}
