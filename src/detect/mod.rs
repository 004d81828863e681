//! Detection types and the classifier capability
//!
//! ## Responsibilities
//!
//! - Frame and detection data model
//! - `Classifier` trait (frame in, detections out)
//! - Randomized demo classifier for running without a real model

use chrono::{DateTime, Utc};
use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One decoded camera frame. Owned by the poll cycle that fetched it
/// and discarded after the annotated copy is encoded for broadcast.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Incident classes the system recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentClass {
    Normal,
    Accident,
    Flood,
    Fire,
    Congestion,
}

impl IncidentClass {
    /// Overlay color for this class (RGB)
    pub fn color(&self) -> [u8; 3] {
        match self {
            IncidentClass::Normal => [0x10, 0xb9, 0x81],
            IncidentClass::Accident => [0xef, 0x44, 0x44],
            IncidentClass::Flood => [0x3b, 0x82, 0xf6],
            IncidentClass::Fire => [0xf9, 0x73, 0x16],
            IncidentClass::Congestion => [0xea, 0xb3, 0x08],
        }
    }

    /// Default severity for this class
    pub fn severity(&self) -> Severity {
        match self {
            IncidentClass::Normal => Severity::Low,
            IncidentClass::Accident => Severity::Critical,
            IncidentClass::Flood => Severity::High,
            IncidentClass::Fire => Severity::Critical,
            IncidentClass::Congestion => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentClass::Normal => "normal",
            IncidentClass::Accident => "accident",
            IncidentClass::Flood => "flood",
            IncidentClass::Fire => "fire",
            IncidentClass::Congestion => "congestion",
        }
    }
}

/// Detection severity, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(crate::Error::Validation(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

/// Bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One detection within a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class: IncidentClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub severity: Severity,
}

/// Overall status of a detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    Normal,
    Alert,
}

/// Result of classifying one frame.
///
/// Construct through [`DetectionResult::new`]: status is derived from the
/// detection list (alert iff non-empty) and cannot be set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub status: DetectionStatus,
    pub detections: Vec<Detection>,
    pub timestamp: DateTime<Utc>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>, frame_width: u32, frame_height: u32) -> Self {
        let status = if detections.is_empty() {
            DetectionStatus::Normal
        } else {
            DetectionStatus::Alert
        };
        Self {
            status,
            detections,
            timestamp: Utc::now(),
            frame_width,
            frame_height,
        }
    }

    pub fn is_alert(&self) -> bool {
        self.status == DetectionStatus::Alert
    }

    /// Highest severity among detections, if any
    pub fn max_severity(&self) -> Option<Severity> {
        self.detections.iter().map(|d| d.severity).max()
    }
}

/// Classifier capability: frame in, structured detections out.
///
/// Implementations must not fail for a structurally valid frame; frames
/// that fail decode are rejected by the frame source before reaching
/// this boundary. Production implementations must be deterministic for
/// a fixed frame and model state.
pub trait Classifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<DetectionResult>;
}

/// Demo classifier with randomized output.
///
/// Stands in for a real model: roughly 15% of frames produce a single
/// random non-normal detection with a plausible confidence and a box
/// inside the frame bounds. Not deterministic, demo use only.
pub struct DemoClassifier {
    alert_probability: f64,
}

impl DemoClassifier {
    pub fn new() -> Self {
        Self {
            alert_probability: 0.15,
        }
    }

    pub fn with_probability(alert_probability: f64) -> Self {
        Self { alert_probability }
    }
}

impl Default for DemoClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DemoClassifier {
    fn classify(&self, frame: &Frame) -> Result<DetectionResult> {
        let (w, h) = (frame.width(), frame.height());
        let mut rng = rand::thread_rng();

        let mut detections = Vec::new();
        if rng.gen_bool(self.alert_probability) {
            let class = match rng.gen_range(0..4) {
                0 => IncidentClass::Accident,
                1 => IncidentClass::Flood,
                2 => IncidentClass::Fire,
                _ => IncidentClass::Congestion,
            };

            // Box somewhere inside the frame, at most half the frame size
            let bw = rng.gen_range(w / 8..=(w / 2).max(w / 8 + 1));
            let bh = rng.gen_range(h / 8..=(h / 2).max(h / 8 + 1));
            let x = rng.gen_range(0..w.saturating_sub(bw).max(1));
            let y = rng.gen_range(0..h.saturating_sub(bh).max(1));

            detections.push(Detection {
                class,
                confidence: rng.gen_range(0.75..0.98),
                bbox: BoundingBox {
                    x,
                    y,
                    w: bw,
                    h: bh,
                },
                severity: class.severity(),
            });
        }

        Ok(DetectionResult::new(detections, w, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::new(w, h))
    }

    #[test]
    fn test_status_derived_from_detections() {
        let empty = DetectionResult::new(vec![], 640, 480);
        assert_eq!(empty.status, DetectionStatus::Normal);
        assert!(!empty.is_alert());

        let det = Detection {
            class: IncidentClass::Fire,
            confidence: 0.9,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                w: 10,
                h: 10,
            },
            severity: Severity::Critical,
        };
        let alert = DetectionResult::new(vec![det], 640, 480);
        assert_eq!(alert.status, DetectionStatus::Alert);
        assert!(alert.is_alert());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_max_severity() {
        let mk = |class: IncidentClass| Detection {
            class,
            confidence: 0.8,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                w: 5,
                h: 5,
            },
            severity: class.severity(),
        };
        let result = DetectionResult::new(
            vec![mk(IncidentClass::Congestion), mk(IncidentClass::Fire)],
            640,
            480,
        );
        assert_eq!(result.max_severity(), Some(Severity::Critical));

        let empty = DetectionResult::new(vec![], 640, 480);
        assert_eq!(empty.max_severity(), None);
    }

    #[test]
    fn test_demo_classifier_boxes_within_bounds() {
        let classifier = DemoClassifier::with_probability(1.0);
        let frame = test_frame(320, 240);

        for _ in 0..50 {
            let result = classifier.classify(&frame).unwrap();
            assert!(result.is_alert());
            for d in &result.detections {
                assert!(d.bbox.x + d.bbox.w <= 320);
                assert!(d.bbox.y + d.bbox.h <= 240);
                assert!(d.confidence >= 0.0 && d.confidence <= 1.0);
                assert_ne!(d.class, IncidentClass::Normal);
            }
        }
    }

    #[test]
    fn test_demo_classifier_zero_probability_is_normal() {
        let classifier = DemoClassifier::with_probability(0.0);
        let frame = test_frame(320, 240);
        let result = classifier.classify(&frame).unwrap();
        assert_eq!(result.status, DetectionStatus::Normal);
    }

    #[test]
    fn test_class_serializes_lowercase() {
        let json = serde_json::to_string(&IncidentClass::Accident).unwrap();
        assert_eq!(json, "\"accident\"");
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
