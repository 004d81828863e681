//! camrelay - Camera Detection Relay
//!
//! Polls a single IP camera, runs each frame through an incident
//! classifier, and fans annotated results out to WebSocket viewers.
//!
//! ## Architecture (7 Components)
//!
//! 1. FrameSource - Frame capture from the upstream camera
//! 2. Classifier - Frame -> detection result capability
//! 3. Annotator - Detection overlay + JPEG encode
//! 4. HistoryBuffer - Alert recording (ring buffer)
//! 5. NotificationGate - Rate-limited outbound alerts
//! 6. BroadcastHub - WebSocket distribution
//! 7. PollLoop - Fixed-cadence orchestration
//!
//! ## Design Principles
//!
//! - Single writer: the poll loop is the only producer of frames/results
//! - Bounded memory: history never retains pixels, the ring evicts oldest
//! - Per-cycle failure isolation: only an explicit stop ends the loop

pub mod annotator;
pub mod detect;
pub mod error;
pub mod frame_source;
pub mod history;
pub mod hub;
pub mod models;
pub mod notifier;
pub mod poll_loop;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
