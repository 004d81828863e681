//! Annotator - Detection Overlay Rendering
//!
//! ## Responsibilities
//!
//! - Draw bounding boxes in the class color
//! - Draw `"{CLASS} {confidence%}"` labels above each box
//! - Overlay a wall-clock timestamp in the top-left corner
//! - Encode the annotated frame as JPEG for broadcast
//!
//! Pure transform: never touches history or triggers side effects.

mod font;

use chrono::Local;
use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};

use crate::detect::{Detection, DetectionResult, Frame};
use crate::error::{Error, Result};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Box outline thickness in pixels
const BOX_THICKNESS: u32 = 2;
/// Text scale factor (each font pixel becomes scale x scale)
const TEXT_SCALE: u32 = 2;

/// Annotator instance
pub struct Annotator {
    jpeg_quality: u8,
}

impl Annotator {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Render detection overlays onto a copy of the frame and encode it
    /// as JPEG. The input frame is left untouched.
    pub fn annotate(&self, frame: &Frame, result: &DetectionResult) -> Result<Vec<u8>> {
        let mut canvas = frame.image.clone();

        for detection in &result.detections {
            draw_detection(&mut canvas, detection);
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        draw_text(&mut canvas, &timestamp, 10, 10, WHITE, Some(BLACK));

        encode_jpeg(&canvas, self.jpeg_quality)
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(80)
    }
}

fn draw_detection(canvas: &mut RgbImage, detection: &Detection) {
    let color = Rgb(detection.class.color());
    let (iw, ih) = (canvas.width(), canvas.height());

    // Clamp the box to the frame so out-of-range coords never panic
    let x = detection.bbox.x.min(iw.saturating_sub(1));
    let y = detection.bbox.y.min(ih.saturating_sub(1));
    let w = detection.bbox.w.min(iw - x);
    let h = detection.bbox.h.min(ih - y);

    draw_hollow_rect(canvas, x, y, w, h, color);

    let label = format!(
        "{} {}%",
        detection.class.as_str().to_uppercase(),
        (detection.confidence * 100.0).round() as u32
    );
    let label_height = font::GLYPH_HEIGHT * TEXT_SCALE + 2;
    // Above the box when there is room, otherwise just inside it
    let label_y = if y >= label_height {
        y - label_height
    } else {
        y + BOX_THICKNESS + 1
    };
    draw_text(canvas, &label, x, label_y, WHITE, Some(color));
}

fn draw_hollow_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let (iw, ih) = (canvas.width(), canvas.height());
    for t in 0..BOX_THICKNESS {
        // Horizontal edges
        for px in x..(x + w).min(iw) {
            if y + t < ih {
                canvas.put_pixel(px, y + t, color);
            }
            if y + h > t && y + h - t - 1 < ih {
                canvas.put_pixel(px, y + h - t - 1, color);
            }
        }
        // Vertical edges
        for py in y..(y + h).min(ih) {
            if x + t < iw {
                canvas.put_pixel(x + t, py, color);
            }
            if x + w > t && x + w - t - 1 < iw {
                canvas.put_pixel(x + w - t - 1, py, color);
            }
        }
    }
}

fn draw_text(
    canvas: &mut RgbImage,
    text: &str,
    x: u32,
    y: u32,
    color: Rgb<u8>,
    background: Option<Rgb<u8>>,
) {
    let (iw, ih) = (canvas.width(), canvas.height());
    let mut cursor_x = x;

    for c in text.chars() {
        let bitmap = font::glyph(c);
        let cell_w = (font::GLYPH_WIDTH + 1) * TEXT_SCALE;
        let cell_h = (font::GLYPH_HEIGHT + 1) * TEXT_SCALE;

        if let Some(bg) = background {
            for dy in 0..cell_h {
                for dx in 0..cell_w {
                    let (px, py) = (cursor_x + dx, y + dy);
                    if px < iw && py < ih {
                        canvas.put_pixel(px, py, bg);
                    }
                }
            }
        }

        for (row, bits) in bitmap.iter().enumerate() {
            for col in 0..font::GLYPH_WIDTH {
                if bits & (1 << (font::GLYPH_WIDTH - 1 - col)) != 0 {
                    for sy in 0..TEXT_SCALE {
                        for sx in 0..TEXT_SCALE {
                            let px = cursor_x + col * TEXT_SCALE + sx;
                            let py = y + row as u32 * TEXT_SCALE + sy + TEXT_SCALE / 2;
                            if px < iw && py < ih {
                                canvas.put_pixel(px, py, color);
                            }
                        }
                    }
                }
            }
        }

        cursor_x += cell_w;
        if cursor_x >= iw {
            break;
        }
    }
}

fn encode_jpeg(canvas: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(canvas)
        .map_err(|e| Error::Internal(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, IncidentClass, Severity};

    fn black_frame(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::new(w, h))
    }

    fn detection(x: u32, y: u32, w: u32, h: u32) -> Detection {
        Detection {
            class: IncidentClass::Accident,
            confidence: 0.9,
            bbox: BoundingBox { x, y, w, h },
            severity: Severity::Critical,
        }
    }

    #[test]
    fn test_annotate_produces_jpeg() {
        let annotator = Annotator::default();
        let frame = black_frame(320, 240);
        let result = DetectionResult::new(vec![detection(50, 50, 100, 80)], 320, 240);

        let encoded = annotator.annotate(&frame, &result).unwrap();
        assert!(!encoded.is_empty());
        // JPEG SOI marker
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_box_drawn_in_class_color() {
        let frame = black_frame(320, 240);
        let mut canvas = frame.image.clone();
        let det = detection(50, 50, 100, 80);
        draw_detection(&mut canvas, &det);

        let color = Rgb(IncidentClass::Accident.color());
        // Top-left corner of the outline
        assert_eq!(canvas.get_pixel(50, 50), &color);
        // Bottom edge
        assert_eq!(canvas.get_pixel(100, 129), &color);
        // Interior stays untouched
        assert_eq!(canvas.get_pixel(100, 90), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_box_does_not_panic() {
        let annotator = Annotator::default();
        let frame = black_frame(100, 100);
        let result = DetectionResult::new(vec![detection(90, 90, 500, 500)], 100, 100);
        let encoded = annotator.annotate(&frame, &result).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_label_near_top_falls_inside_box() {
        let annotator = Annotator::default();
        let frame = black_frame(200, 200);
        // Box at the very top: no room for a label above it
        let result = DetectionResult::new(vec![detection(0, 0, 100, 60)], 200, 200);
        let encoded = annotator.annotate(&frame, &result).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_annotate_does_not_mutate_input() {
        let annotator = Annotator::default();
        let frame = black_frame(64, 64);
        let result = DetectionResult::new(vec![detection(10, 10, 30, 30)], 64, 64);
        annotator.annotate(&frame, &result).unwrap();
        assert_eq!(frame.image.get_pixel(10, 10), &Rgb([0, 0, 0]));
    }
}
