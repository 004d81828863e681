//! FrameSource - Frame Capture from the Upstream Camera
//!
//! ## Responsibilities
//!
//! - HTTP snapshot capture from the configured capture endpoint
//! - Per-call timeout so a hung camera never stalls the poll loop
//! - Decode validation (bad payloads never reach the classifier)
//! - Runtime reconfiguration of the camera address
//!
//! Retry policy lives in the poll loop, not here.

use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::detect::Frame;
use crate::error::{Error, Result};

/// Default per-fetch timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 4;

/// Frame capture capability.
///
/// `fetch` returns one frame or an error describing why the upstream is
/// unusable this cycle (`Unreachable` / `DecodeFailure`). No internal
/// retry.
pub trait FrameSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Frame>> + Send;
}

/// HTTP frame source: GET against a camera capture endpoint
/// (e.g. `http://192.168.1.100/capture` on an ESP32-CAM).
pub struct HttpFrameSource {
    client: reqwest::Client,
    capture_url: RwLock<String>,
}

impl HttpFrameSource {
    /// Create a new source for the given capture URL
    pub fn new(capture_url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            capture_url: RwLock::new(capture_url),
        })
    }

    /// Current capture URL
    pub async fn target(&self) -> String {
        self.capture_url.read().await.clone()
    }

    /// Update the capture URL at runtime. The poll loop picks the new
    /// target up on its next cycle, no restart needed.
    pub async fn set_target(&self, capture_url: String) {
        let mut url = self.capture_url.write().await;
        tracing::info!(old = %url, new = %capture_url, "Camera capture URL updated");
        *url = capture_url;
    }

    /// Probe reachability without decoding the payload
    pub async fn check(&self) -> bool {
        let url = self.target().await;
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn fetch_inner(&self) -> Result<Frame> {
        let url = self.target().await;

        let resp = self.client.get(&url).send().await.map_err(|e| {
            let cause = if e.is_timeout() {
                format!("timeout fetching {url}")
            } else if e.is_connect() {
                format!("connection failed to {url}")
            } else {
                format!("request to {url} failed: {e}")
            };
            Error::Unreachable(cause)
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Unreachable(format!(
                "camera returned status {status} for {url}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Unreachable(format!("failed reading body from {url}: {e}")))?;

        decode_frame(&bytes)
    }
}

impl FrameSource for HttpFrameSource {
    fn fetch(&self) -> impl Future<Output = Result<Frame>> + Send {
        self.fetch_inner()
    }
}

/// Decode raw payload bytes into a frame.
///
/// Rejecting undecodable payloads here upholds the classifier contract:
/// it only ever sees structurally valid frames.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::DecodeFailure(format!("payload is not a valid image: {e}")))?;
    Ok(Frame::new(image.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::jpeg::JpegEncoder, RgbImage};

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::new(w, h);
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 80)
            .encode_image(&img)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_valid_jpeg() {
        let frame = decode_frame(&jpeg_bytes(64, 48)).unwrap();
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
    }

    #[test]
    fn test_decode_garbage_is_decode_failure() {
        let err = decode_frame(b"not an image at all").unwrap_err();
        assert!(matches!(err, Error::DecodeFailure(_)));
    }

    #[test]
    fn test_decode_empty_is_decode_failure() {
        let err = decode_frame(&[]).unwrap_err();
        assert!(matches!(err, Error::DecodeFailure(_)));
    }

    #[tokio::test]
    async fn test_set_target_updates_url() {
        let source =
            HttpFrameSource::new("http://192.168.1.100/capture".to_string(), 4).unwrap();
        assert_eq!(source.target().await, "http://192.168.1.100/capture");

        source
            .set_target("http://10.0.0.7/capture".to_string())
            .await;
        assert_eq!(source.target().await, "http://10.0.0.7/capture");
    }
}
