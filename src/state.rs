//! Application state
//!
//! Holds all shared components and configuration. Every piece of
//! mutable state (camera target, last-sent time) lives inside the
//! owning component; nothing here is a process-wide free variable.

use std::sync::Arc;
use std::time::Duration;

use crate::annotator::Annotator;
use crate::detect::{Classifier, Severity};
use crate::frame_source::HttpFrameSource;
use crate::history::HistoryBuffer;
use crate::hub::BroadcastHub;
use crate::notifier::{NotificationGate, WebhookSender};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Upstream camera capture URL
    pub camera_url: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Cadence between poll cycle starts
    pub poll_interval: Duration,
    /// Per-fetch timeout
    pub fetch_timeout_secs: u64,
    /// Cooldown between outbound notifications
    pub notify_cooldown: Duration,
    /// Minimum severity that triggers a notification
    pub notify_min_severity: Severity,
    /// Alert webhook URL; notifications disabled when unset
    pub alert_webhook_url: Option<String>,
    /// Notification recipient identifier passed to the sender
    pub alert_recipient: String,
    /// History ring capacity
    pub history_capacity: usize,
    /// JPEG quality for annotated frames
    pub jpeg_quality: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_url: std::env::var("CAMERA_URL")
                .unwrap_or_else(|_| "http://192.168.1.100/capture".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            poll_interval: Duration::from_millis(
                std::env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(crate::poll_loop::DEFAULT_INTERVAL_MS),
            ),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::frame_source::DEFAULT_FETCH_TIMEOUT_SECS),
            notify_cooldown: Duration::from_secs(
                std::env::var("NOTIFY_COOLDOWN_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(crate::notifier::DEFAULT_COOLDOWN_SECS),
            ),
            notify_min_severity: std::env::var("NOTIFY_MIN_SEVERITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Severity::High),
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL").ok(),
            alert_recipient: std::env::var("ALERT_RECIPIENT")
                .unwrap_or_else(|_| "ops@example.com".to_string()),
            history_capacity: std::env::var("HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::history::DEFAULT_CAPACITY),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(80),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config (startup values)
    pub config: AppConfig,
    /// FrameSource (upstream camera adapter, runtime-mutable target)
    pub frame_source: Arc<HttpFrameSource>,
    /// Classifier capability
    pub classifier: Arc<dyn Classifier>,
    /// Annotator (overlay + JPEG encode)
    pub annotator: Arc<Annotator>,
    /// HistoryBuffer (alert ring)
    pub history: Arc<HistoryBuffer>,
    /// NotificationGate; absent when no webhook is configured
    pub notifier: Option<Arc<NotificationGate<WebhookSender>>>,
    /// BroadcastHub (WebSocket fan-out)
    pub hub: Arc<BroadcastHub>,
    /// Process start time for uptime reporting
    pub started_at: std::time::Instant,
}
