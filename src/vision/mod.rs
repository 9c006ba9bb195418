//! Vision/OCR Layer
//!
//! Raw text detections enter the engine through the `OcrProvider`
//! capability. The inference backends themselves (cloud vision APIs, local
//! ONNX models, platform OCR) are external collaborators; this module
//! defines the wire-shaped detection model, the provider trait, and two
//! reference adapters:
//! - `HttpOcrProvider` posts PNG frames to a detection service
//! - `ScriptedOcr` replays fixed detection frames (tests, `--mock` runs)

pub mod color;
pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::frame::CapturedFrame;

pub use color::sample_region_colors;
pub use http::HttpOcrProvider;
pub use scripted::ScriptedOcr;

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// External detection service reached over HTTP
    #[default]
    HttpService,
    /// Scripted detections for offline runs and tests
    Scripted,
}

/// Dominant color estimate for a detected region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionColor {
    /// RGB components
    pub rgb: [u8; 3],
    /// Fraction of sampled pixels matching this color (0.0 - 1.0)
    pub coverage: f32,
}

/// Orientation hint reported by an OCR backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationHint {
    Horizontal,
    Vertical,
}

/// One OCR-reported span of text (a glyph or word) for a single frame.
///
/// Created fresh every capture cycle and discarded within it. Confidence,
/// colors, vertices and the orientation hint are all optional; the engine
/// derives or omits what is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Four polygon corners for rotated detections
    #[serde(default)]
    pub vertices: Option<[(f32, f32); 4]>,
    /// Recognition confidence in [0, 1]
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub foreground_color: Option<RegionColor>,
    #[serde(default)]
    pub background_color: Option<RegionColor>,
    #[serde(default)]
    pub text_orientation: Option<OrientationHint>,
}

impl RawDetection {
    /// Minimal detection with just text and an axis-aligned box
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            vertices: None,
            confidence: None,
            foreground_color: None,
            background_color: None,
            text_orientation: None,
        }
    }

    /// Builder-style confidence setter
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// OCR capability failure.
///
/// Never fatal to the block pipeline: the cycle that hits one simply
/// produces no detections and the next cycle retries.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Request(String),
    #[error("OCR response could not be decoded: {0}")]
    Decode(String),
    #[error("frame could not be encoded: {0}")]
    Encode(String),
}

/// Asynchronous OCR capability for one frame.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Recognize text spans in the frame
    async fn recognize(&self, frame: &CapturedFrame) -> Result<Vec<RawDetection>, OcrError>;
}
