//! HistoryBuffer - Alert Recording (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Store recent alert results in a bounded FIFO ring
//! - Strip frame payloads (history never retains pixels)
//! - Serve concurrent reads from request handlers
//!
//! Written only by the poll loop; read by arbitrary handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::detect::{Detection, DetectionResult, DetectionStatus};

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// One recorded alert. Carries the detection result without any frame
/// payload so the buffer's memory stays bounded by its capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: DetectionStatus,
    pub detections: Vec<Detection>,
    pub timestamp: DateTime<Utc>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl From<&DetectionResult> for HistoryEntry {
    fn from(result: &DetectionResult) -> Self {
        Self {
            status: result.status,
            detections: result.detections.clone(),
            timestamp: result.timestamp,
            frame_width: result.frame_width,
            frame_height: result.frame_height,
        }
    }
}

/// HistoryBuffer instance
pub struct HistoryBuffer {
    entries: RwLock<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a new buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a detection result. Normal results are ignored; alert
    /// results are appended frame-stripped, evicting the oldest entry
    /// when the ring is full.
    pub async fn record(&self, result: &DetectionResult) {
        if result.status == DetectionStatus::Normal {
            return;
        }

        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(HistoryEntry::from(result));
        tracing::debug!(len = entries.len(), "Alert recorded in history");
    }

    /// Last min(n, len) entries in chronological order (oldest of the
    /// returned window first).
    pub async fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, IncidentClass, Severity};

    fn alert(confidence: f32) -> DetectionResult {
        DetectionResult::new(
            vec![Detection {
                class: IncidentClass::Fire,
                confidence,
                bbox: BoundingBox {
                    x: 0,
                    y: 0,
                    w: 10,
                    h: 10,
                },
                severity: Severity::Critical,
            }],
            640,
            480,
        )
    }

    fn normal() -> DetectionResult {
        DetectionResult::new(vec![], 640, 480)
    }

    #[tokio::test]
    async fn test_normal_results_are_not_recorded() {
        let buffer = HistoryBuffer::new(10);
        buffer.record(&normal()).await;
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn test_overflow_keeps_last_capacity_entries() {
        let capacity = 5;
        let buffer = HistoryBuffer::new(capacity);

        // Record 8 alerts tagged by confidence 0.10 .. 0.17
        for i in 0..8 {
            buffer.record(&alert(0.10 + i as f32 / 100.0)).await;
        }

        assert_eq!(buffer.len().await, capacity);
        let entries = buffer.recent(capacity).await;
        // Exactly the last 5 in arrival order, oldest first
        let kept: Vec<u32> = entries
            .iter()
            .map(|e| (e.detections[0].confidence * 100.0).round() as u32)
            .collect();
        assert_eq!(kept, vec![13, 14, 15, 16, 17]);
    }

    #[tokio::test]
    async fn test_recent_window_is_chronological() {
        let buffer = HistoryBuffer::new(10);
        for i in 0..4 {
            buffer.record(&alert(0.20 + i as f32 / 100.0)).await;
        }

        let window = buffer.recent(2).await;
        assert_eq!(window.len(), 2);
        let pct = |e: &HistoryEntry| (e.detections[0].confidence * 100.0).round() as u32;
        assert_eq!(pct(&window[0]), 22);
        assert_eq!(pct(&window[1]), 23);
    }

    #[tokio::test]
    async fn test_recent_larger_than_len_returns_all() {
        let buffer = HistoryBuffer::new(10);
        buffer.record(&alert(0.5)).await;
        let entries = buffer.recent(100).await;
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_entries_carry_no_frame_payload() {
        // Compile-time property really: HistoryEntry has no image field.
        // Assert the serialized form matches the documented shape.
        let buffer = HistoryBuffer::new(10);
        buffer.record(&alert(0.9)).await;
        let entry = &buffer.recent(1).await[0];
        let json = serde_json::to_value(entry).unwrap();
        assert!(json.get("frame").is_none());
        assert!(json.get("image").is_none());
        assert_eq!(json["status"], "alert");
    }
}
