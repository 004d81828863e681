//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::detect::IncidentClass;
use crate::error::{Error, Result};
use crate::models::ApiResponse;
use crate::notifier::AlertEvent;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::camera_status))
        // Config
        .route("/api/config", get(get_config))
        .route("/api/config/camera", put(update_camera_url))
        // History
        .route("/api/history", get(get_history))
        // One-shot capture with detection
        .route("/api/capture", get(capture_once))
        // Forced notification (operator-triggered)
        .route("/api/alerts/test", post(trigger_alert))
        // WebSocket feed
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Config Handlers
// ========================================

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let capture_url = state.frame_source.target().await;
    Json(ApiResponse::success(json!({
        "capture_url": capture_url,
        "poll_interval_ms": state.config.poll_interval.as_millis() as u64,
        "notify_cooldown_secs": state.config.notify_cooldown.as_secs(),
        "notify_min_severity": state.config.notify_min_severity.as_str(),
        "history_capacity": state.config.history_capacity,
    })))
}

#[derive(Debug, Deserialize)]
struct UpdateCameraRequest {
    capture_url: String,
}

async fn update_camera_url(
    State(state): State<AppState>,
    Json(req): Json<UpdateCameraRequest>,
) -> Result<impl IntoResponse> {
    if !req.capture_url.starts_with("http://") && !req.capture_url.starts_with("https://") {
        return Err(Error::Validation(
            "capture_url must be an http(s) URL".to_string(),
        ));
    }

    state.frame_source.set_target(req.capture_url.clone()).await;
    Ok(Json(ApiResponse::success(json!({
        "capture_url": req.capture_url,
    }))))
}

// ========================================
// History Handlers
// ========================================

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50);
    let entries = state.history.recent(limit).await;
    Json(ApiResponse::success(json!({ "detections": entries })))
}

// ========================================
// Capture Handler
// ========================================

/// One-shot fetch + classify + annotate, outside the poll cadence
async fn capture_once(State(state): State<AppState>) -> Result<impl IntoResponse> {
    use crate::frame_source::FrameSource;

    let frame = state.frame_source.fetch().await?;
    let result = state.classifier.classify(&frame)?;
    let encoded = state.annotator.annotate(&frame, &result)?;

    Ok(Json(ApiResponse::success(json!({
        "status": result.status,
        "detections": result.detections,
        "timestamp": result.timestamp,
        "frame_size": { "width": result.frame_width, "height": result.frame_height },
        "frame": BASE64.encode(&encoded),
    }))))
}

// ========================================
// Alert Handler
// ========================================

#[derive(Debug, Deserialize)]
struct TriggerAlertRequest {
    class: Option<IncidentClass>,
    confidence: Option<f32>,
}

/// Forced notification through the gate, bypassing the cooldown
async fn trigger_alert(
    State(state): State<AppState>,
    Json(req): Json<TriggerAlertRequest>,
) -> Result<impl IntoResponse> {
    let Some(notifier) = &state.notifier else {
        return Err(Error::Config(
            "notifications disabled: ALERT_WEBHOOK_URL not set".to_string(),
        ));
    };

    let class = req.class.unwrap_or(IncidentClass::Accident);
    let event = AlertEvent {
        class,
        severity: class.severity(),
        confidence: req.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
    };

    let outcome = notifier.try_notify(&event, true).await;
    Ok(Json(ApiResponse::success(outcome)))
}

// ========================================
// WebSocket
// ========================================

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Register with the broadcast hub
    let (subscriber_id, mut rx) = state.hub.subscribe().await;

    tracing::info!(subscriber_id = %subscriber_id, "WebSocket client connected");

    // Forward feed messages from the hub to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming messages; the feed is one-way but close/ping must
    // still be observed
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(subscriber_id = %subscriber_id, "WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(subscriber_id = %subscriber_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        subscriber_id
    });

    // Whichever side finishes first tears the connection down
    let subscriber_id = tokio::select! {
        _ = send_task => subscriber_id,
        result = recv_task => result.unwrap_or(subscriber_id),
    };

    state.hub.unsubscribe(&subscriber_id).await;
}
