//! camrelay - Camera Detection Relay
//!
//! Main entry point.

use std::sync::Arc;

use camrelay::{
    annotator::Annotator,
    detect::DemoClassifier,
    frame_source::HttpFrameSource,
    history::HistoryBuffer,
    hub::BroadcastHub,
    notifier::{NotificationGate, WebhookSender},
    poll_loop::PollLoop,
    state::{AppConfig, AppState},
    web_api,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camrelay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        camera_url = %config.camera_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        notify_cooldown_secs = config.notify_cooldown.as_secs(),
        history_capacity = config.history_capacity,
        "Configuration loaded"
    );

    // Initialize components
    let frame_source = Arc::new(HttpFrameSource::new(
        config.camera_url.clone(),
        config.fetch_timeout_secs,
    )?);
    let classifier = Arc::new(DemoClassifier::new());
    let annotator = Arc::new(Annotator::new(config.jpeg_quality));
    let history = Arc::new(HistoryBuffer::new(config.history_capacity));
    let hub = Arc::new(BroadcastHub::new());

    let notifier = match &config.alert_webhook_url {
        Some(url) => {
            tracing::info!(webhook_url = %url, "Notifications enabled");
            Some(Arc::new(NotificationGate::new(
                WebhookSender::new(url.clone(), 10)?,
                config.alert_recipient.clone(),
                config.notify_cooldown,
            )))
        }
        None => {
            tracing::info!("Notifications disabled (ALERT_WEBHOOK_URL not set)");
            None
        }
    };

    // Create the poll loop
    let poll = Arc::new(PollLoop::new(
        frame_source.clone(),
        classifier.clone(),
        annotator.clone(),
        history.clone(),
        notifier.clone(),
        hub.clone(),
        config.poll_interval,
        config.notify_min_severity,
    ));

    // Create application state
    let state = AppState {
        config: config.clone(),
        frame_source,
        classifier,
        annotator,
        history,
        notifier,
        hub,
        started_at: std::time::Instant::now(),
    };

    // Create router
    let app = web_api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start the poll loop
    poll.start().await;
    tracing::info!("Poll loop started");

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(poll.clone()))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then stop the poll loop before the server drains
async fn shutdown_signal(
    poll: Arc<PollLoop<HttpFrameSource, WebhookSender>>,
) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    poll.stop().await;
}
