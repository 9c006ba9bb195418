//! Detection Normalizer
//!
//! First stage of the block pipeline: validates raw per-frame detections,
//! converts rotated polygons to axis-aligned rectangles with a rotation
//! note, and drops malformed entries. Drops are counted for observability
//! and are never fatal.

use tracing::debug;

use crate::vision::{OrientationHint, RawDetection, RegionColor};

use super::geometry::{hull_of_polygon, Rect};

/// A cleaned detection ready for clustering
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Trimmed text content
    pub text: String,
    /// Axis-aligned bounding rectangle
    pub rect: Rect,
    /// Deviation of the detection polygon from axis alignment, in degrees
    pub rotation_deg: Option<f32>,
    /// Recognition confidence in [0, 1]
    pub confidence: Option<f32>,
    /// Foreground color estimate from the OCR backend
    pub foreground: Option<RegionColor>,
    /// Background color estimate from the OCR backend
    pub background: Option<RegionColor>,
    /// Orientation hint from the OCR backend
    pub hint: Option<OrientationHint>,
}

/// Normalize one frame's raw detections.
///
/// Returns the cleaned list in input order and the number of malformed
/// entries dropped (empty text, non-positive geometry).
pub fn normalize(raw: Vec<RawDetection>) -> (Vec<Detection>, u64) {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut dropped = 0u64;

    for det in raw {
        let text = det.text.trim().to_string();
        if text.is_empty() {
            dropped += 1;
            debug!("dropping detection with empty text");
            continue;
        }

        let (rect, rotation_deg) = match det.vertices {
            Some(vertices) => {
                let (rect, rotation) = hull_of_polygon(&vertices);
                (rect, Some(rotation))
            }
            None => (Rect::new(det.x, det.y, det.width, det.height), None),
        };

        if rect.width <= 0.0 || rect.height <= 0.0 {
            dropped += 1;
            debug!(
                text = %text,
                width = rect.width,
                height = rect.height,
                "dropping detection with degenerate geometry"
            );
            continue;
        }

        cleaned.push(Detection {
            text,
            rect,
            rotation_deg,
            confidence: det.confidence,
            foreground: det.foreground_color,
            background: det.background_color,
            hint: det.text_orientation,
        });
    }

    (cleaned, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_valid_detection() {
        let (cleaned, dropped) = normalize(vec![RawDetection::new("hi", 1.0, 2.0, 10.0, 5.0)]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(dropped, 0);
        assert_eq!(cleaned[0].text, "hi");
        assert_eq!(cleaned[0].rect, Rect::new(1.0, 2.0, 10.0, 5.0));
        assert!(cleaned[0].rotation_deg.is_none());
    }

    #[test]
    fn test_drops_non_positive_dimensions() {
        let (cleaned, dropped) = normalize(vec![
            RawDetection::new("a", 0.0, 0.0, 0.0, 5.0),
            RawDetection::new("b", 0.0, 0.0, 5.0, -1.0),
            RawDetection::new("c", 0.0, 0.0, 5.0, 5.0),
        ]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].text, "c");
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_drops_empty_and_whitespace_text() {
        let (cleaned, dropped) = normalize(vec![
            RawDetection::new("", 0.0, 0.0, 5.0, 5.0),
            RawDetection::new("   ", 0.0, 0.0, 5.0, 5.0),
        ]);
        assert!(cleaned.is_empty());
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_trims_text() {
        let (cleaned, _) = normalize(vec![RawDetection::new("  word  ", 0.0, 0.0, 5.0, 5.0)]);
        assert_eq!(cleaned[0].text, "word");
    }

    #[test]
    fn test_polygon_becomes_hull_with_rotation_note() {
        let mut det = RawDetection::new("r", 0.0, 0.0, 0.0, 0.0);
        det.vertices = Some([(10.0, 0.0), (20.0, 10.0), (10.0, 20.0), (0.0, 10.0)]);
        let (cleaned, dropped) = normalize(vec![det]);
        assert_eq!(dropped, 0);
        assert_eq!(cleaned[0].rect, Rect::new(0.0, 0.0, 20.0, 20.0));
        assert!((cleaned[0].rotation_deg.unwrap() - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_polygon_dropped() {
        let mut det = RawDetection::new("line", 0.0, 0.0, 0.0, 0.0);
        det.vertices = Some([(0.0, 5.0), (10.0, 5.0), (10.0, 5.0), (0.0, 5.0)]);
        let (cleaned, dropped) = normalize(vec![det]);
        assert!(cleaned.is_empty());
        assert_eq!(dropped, 1);
    }
}
