//! NotificationGate - Rate-Limited Outbound Alerts
//!
//! ## Responsibilities
//!
//! - Cooldown window between non-forced notifications
//! - Atomic check-then-act on the last-sent timestamp
//! - Delegation to an external sender with its own timeout
//!
//! A failed send never consumes the cooldown window; the next attempt
//! may retry immediately.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::detect::{IncidentClass, Severity};
use crate::error::{Error, Result};

/// Default cooldown between notifications in seconds
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;
/// Default timeout for one send attempt in seconds
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

/// Alert event handed to the gate
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub class: IncidentClass,
    pub severity: Severity,
    pub confidence: f32,
}

/// Outcome of a notification attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// Sender succeeded; the cooldown window restarted
    Sent,
    /// Suppressed: the window has not elapsed yet
    Cooldown { remaining_secs: u64 },
    /// Sender failed; the window was not consumed
    Failed { cause: String },
}

/// External delivery capability. Transport is the implementer's choice;
/// the gate only needs success or failure within its timeout.
pub trait AlertSender: Send + Sync {
    fn send(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// NotificationGate instance
pub struct NotificationGate<S: AlertSender> {
    sender: S,
    recipient: String,
    cooldown: Duration,
    send_timeout: Duration,
    /// Time of the last successful send. The mutex is held across the
    /// whole check-then-send-then-update sequence so only one caller
    /// can pass the gate per cooldown period.
    last_sent: Mutex<Option<Instant>>,
}

impl<S: AlertSender> NotificationGate<S> {
    pub fn new(sender: S, recipient: String, cooldown: Duration) -> Self {
        Self {
            sender,
            recipient,
            cooldown,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            last_sent: Mutex::new(None),
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Attempt a notification for the given event.
    ///
    /// Non-forced attempts inside the cooldown window return
    /// [`NotifyOutcome::Cooldown`] without invoking the sender. A forced
    /// attempt always reaches the sender and, on success, restarts the
    /// window.
    pub async fn try_notify(&self, event: &AlertEvent, forced: bool) -> NotifyOutcome {
        let mut last_sent = self.last_sent.lock().await;

        if !forced {
            if let Some(last) = *last_sent {
                let elapsed = last.elapsed();
                if elapsed < self.cooldown {
                    let remaining = (self.cooldown - elapsed).as_secs_f64().ceil() as u64;
                    tracing::debug!(
                        class = event.class.as_str(),
                        remaining_secs = remaining,
                        "Notification suppressed by cooldown"
                    );
                    return NotifyOutcome::Cooldown {
                        remaining_secs: remaining,
                    };
                }
            }
        }

        let subject = format!("CAMRELAY ALERT: {} detected", event.class.as_str().to_uppercase());
        let body = format!(
            "Incident: {}\nSeverity: {}\nConfidence: {:.1}%\nTime: {}",
            event.class.as_str().to_uppercase(),
            event.severity.as_str(),
            event.confidence * 100.0,
            chrono::Utc::now().to_rfc3339(),
        );

        let attempt = tokio::time::timeout(
            self.send_timeout,
            self.sender.send(&subject, &body, &self.recipient),
        )
        .await;

        match attempt {
            Ok(Ok(())) => {
                *last_sent = Some(Instant::now());
                tracing::info!(
                    class = event.class.as_str(),
                    severity = event.severity.as_str(),
                    forced = forced,
                    "Alert notification sent"
                );
                NotifyOutcome::Sent
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Alert sender failed");
                NotifyOutcome::Failed {
                    cause: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.send_timeout.as_secs(),
                    "Alert send timed out"
                );
                NotifyOutcome::Failed {
                    cause: format!("send timed out after {:?}", self.send_timeout),
                }
            }
        }
    }
}

/// Webhook sender: POSTs the alert as JSON to a configured URL.
pub struct WebhookSender {
    client: reqwest::Client,
    url: String,
}

impl WebhookSender {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }
}

impl AlertSender for WebhookSender {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "subject": subject,
                "body": body,
                "recipient": recipient,
            }))
            .send()
            .await
            .map_err(|e| Error::Notify(format!("webhook request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Notify(format!("webhook returned status {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubSender {
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    impl StubSender {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let fail = Arc::new(AtomicBool::new(false));
            (
                Self {
                    calls: calls.clone(),
                    fail: fail.clone(),
                },
                calls,
                fail,
            )
        }
    }

    impl AlertSender for StubSender {
        async fn send(&self, _subject: &str, _body: &str, _recipient: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Notify("stub sender down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            class: IncidentClass::Fire,
            severity: Severity::Critical,
            confidence: 0.9,
        }
    }

    fn gate(sender: StubSender) -> NotificationGate<StubSender> {
        NotificationGate::new(
            sender,
            "ops@example.com".to_string(),
            Duration::from_secs(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_cooldown_is_suppressed() {
        let (sender, calls, _) = StubSender::new();
        let gate = gate(sender);

        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(
            gate.try_notify(&event(), false).await,
            NotifyOutcome::Cooldown { remaining_secs: 1 }
        );
        // Sender was not reached the second time
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_cooldown_succeeds() {
        let (sender, calls, _) = StubSender::new();
        let gate = gate(sender);

        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_does_not_start_cooldown() {
        let (sender, calls, fail) = StubSender::new();
        let gate = gate(sender);

        fail.store(true, Ordering::SeqCst);
        let outcome = gate.try_notify(&event(), false).await;
        assert!(matches!(outcome, NotifyOutcome::Failed { .. }));

        // Retry one second later goes straight through to the sender
        fail.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_bypasses_and_resets_window() {
        let (sender, calls, _) = StubSender::new();
        let gate = gate(sender);

        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);

        tokio::time::advance(Duration::from_secs(100)).await;
        // Forced goes through mid-window...
        assert_eq!(gate.try_notify(&event(), true).await, NotifyOutcome::Sent);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // ...and restarts the window from its own send time
        tokio::time::advance(Duration::from_secs(250)).await;
        assert_eq!(
            gate.try_notify(&event(), false).await,
            NotifyOutcome::Cooldown { remaining_secs: 50 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_never_suppressed() {
        let (sender, calls, _) = StubSender::new();
        let gate = gate(sender);
        assert_eq!(gate.try_notify(&event(), false).await, NotifyOutcome::Sent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
