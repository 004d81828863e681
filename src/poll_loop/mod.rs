//! PollLoop - Fixed-Cadence Orchestration
//!
//! ## Responsibilities
//!
//! - Drive fetch -> classify -> annotate -> dispatch on a fixed cadence
//! - Convert per-cycle failures into error broadcasts, never crash
//! - Record alerts in history and trigger policy-gated notifications
//!
//! One cycle owns at most one in-flight frame; the stop flag is
//! observed between cycles, so the loop terminates within one sleep
//! interval plus one fetch timeout of a stop request.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::annotator::Annotator;
use crate::detect::{Classifier, Frame, Severity};
use crate::error::Error;
use crate::frame_source::FrameSource;
use crate::history::HistoryBuffer;
use crate::hub::{BroadcastHub, DetectionMessage, ErrorMessage, FeedMessage};
use crate::notifier::{AlertEvent, AlertSender, NotificationGate, NotifyOutcome};

/// Default cadence between cycle starts in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 400;

/// PollLoop instance
pub struct PollLoop<S: FrameSource + 'static, A: AlertSender + 'static> {
    source: Arc<S>,
    classifier: Arc<dyn Classifier>,
    annotator: Arc<Annotator>,
    history: Arc<HistoryBuffer>,
    gate: Option<Arc<NotificationGate<A>>>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
    /// Minimum detection severity that triggers a notification attempt
    notify_min_severity: Severity,
    running: Arc<RwLock<bool>>,
}

impl<S: FrameSource + 'static, A: AlertSender + 'static> PollLoop<S, A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<S>,
        classifier: Arc<dyn Classifier>,
        annotator: Arc<Annotator>,
        history: Arc<HistoryBuffer>,
        gate: Option<Arc<NotificationGate<A>>>,
        hub: Arc<BroadcastHub>,
        interval: Duration,
        notify_min_severity: Severity,
    ) -> Self {
        Self {
            source,
            classifier,
            annotator,
            history,
            gate,
            hub,
            interval,
            notify_min_severity,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the polling loop in a background task
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Poll loop already running");
                return;
            }
            *running = true;
        }

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Starting poll loop");

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                {
                    let running = this.running.read().await;
                    if !*running {
                        break;
                    }
                }

                let started = Instant::now();
                this.run_cycle().await;

                // Measured sleep: hold cadence close to the target even
                // when a cycle takes a while
                let elapsed = started.elapsed();
                tokio::time::sleep(this.interval.saturating_sub(elapsed)).await;
            }

            tracing::info!("Poll loop stopped");
        });
    }

    /// Request a stop. Observed between cycles, never mid-fetch.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        tracing::info!("Stopping poll loop");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one fetch/classify/annotate/dispatch cycle. Every failure is
    /// converted into an error broadcast; the caller decides cadence.
    pub async fn run_cycle(&self) {
        let message = match self.source.fetch().await {
            Ok(frame) => self.process_frame(&frame).await,
            Err(e) => {
                tracing::warn!(error = %e, "Frame fetch failed");
                Self::error_message(&e)
            }
        };

        self.hub.broadcast(&message).await;
    }

    async fn process_frame(&self, frame: &Frame) -> FeedMessage {
        let result = match self.classifier.classify(frame) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Classifier failed on a valid frame");
                return Self::error_message(&e);
            }
        };

        let encoded = match self.annotator.annotate(frame, &result) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Annotation failed");
                return Self::error_message(&e);
            }
        };

        if result.is_alert() {
            self.history.record(&result).await;
            self.maybe_notify(&result).await;
        }

        FeedMessage::Detection(DetectionMessage {
            connected: true,
            status: result.status,
            detections: result.detections,
            frame: BASE64.encode(&encoded),
            timestamp: result.timestamp,
        })
    }

    /// Notification policy: attempt a non-forced send when the alert's
    /// strongest detection reaches the configured severity threshold.
    async fn maybe_notify(&self, result: &crate::detect::DetectionResult) {
        let Some(gate) = &self.gate else {
            return;
        };
        let Some(strongest) = result.detections.iter().max_by_key(|d| d.severity) else {
            return;
        };
        if strongest.severity < self.notify_min_severity {
            return;
        }

        let event = AlertEvent {
            class: strongest.class,
            severity: strongest.severity,
            confidence: strongest.confidence,
        };

        match gate.try_notify(&event, false).await {
            NotifyOutcome::Sent => {}
            NotifyOutcome::Cooldown { remaining_secs } => {
                tracing::debug!(remaining_secs, "Notification in cooldown");
            }
            NotifyOutcome::Failed { cause } => {
                // Logged only: a sender failure never affects the
                // broadcast path or the cooldown state
                tracing::warn!(cause = %cause, "Notification failed");
            }
        }
    }

    fn error_message(error: &Error) -> FeedMessage {
        // Unreachable means the upstream never answered; decode and
        // classifier failures happen after a successful transfer
        let connected = !matches!(error, Error::Unreachable(_));
        FeedMessage::Error(ErrorMessage {
            connected,
            message: error.to_string(),
            timestamp: Utc::now(),
        })
    }
}
