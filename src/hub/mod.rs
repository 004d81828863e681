//! BroadcastHub - WebSocket Distribution
//!
//! ## Responsibilities
//!
//! - Subscriber registration and removal
//! - Fan-out of feed messages to every connected subscriber
//! - Explicit removal of subscribers whose sink has failed
//!
//! A send failure to one subscriber never aborts delivery to the
//! others; the failed subscriber is unsubscribed after the pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::detect::{Detection, DetectionStatus};

/// Messages pushed to subscribers at the poll cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Detection(DetectionMessage),
    Error(ErrorMessage),
}

/// One classified frame with its annotated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMessage {
    pub connected: bool,
    pub status: DetectionStatus,
    pub detections: Vec<Detection>,
    /// Base64-encoded annotated JPEG
    pub frame: String,
    pub timestamp: DateTime<Utc>,
}

/// A cycle that produced no frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub connected: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Subscriber connection
struct Subscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// BroadcastHub instance
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    subscriber_count: AtomicU64,
}

impl BroadcastHub {
    /// Create new BroadcastHub
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            subscriber_count: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber. Returns the handle for later removal
    /// and the receiving end of its message channel.
    pub async fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.insert(id, Subscriber { id, tx });
        }
        self.subscriber_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(subscriber_id = %id, "Subscriber connected");
        (id, rx)
    }

    /// Remove a subscriber. Idempotent: removing an unknown or already
    /// removed handle is a no-op.
    pub async fn unsubscribe(&self, id: &Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(id).is_some() {
            self.subscriber_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(subscriber_id = %id, "Subscriber disconnected");
        }
    }

    /// Deliver a message to every registered subscriber. Serializes
    /// once; subscribers whose channel is closed are unsubscribed after
    /// the delivery pass.
    pub async fn broadcast(&self, message: &FeedMessage) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize feed message");
                return;
            }
        };

        let failed: Vec<Uuid> = {
            let subscribers = self.subscribers.read().await;
            tracing::trace!(count = subscribers.len(), "Broadcasting feed message");
            subscribers
                .values()
                .filter(|s| s.tx.send(json.clone()).is_err())
                .map(|s| s.id)
                .collect()
        };

        for id in failed {
            tracing::warn!(subscriber_id = %id, "Subscriber sink closed, removing");
            self.unsubscribe(&id).await;
        }
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> u64 {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
