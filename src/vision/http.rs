//! HTTP OCR provider
//!
//! Posts PNG-encoded frames to an external detection service and parses
//! the returned detection list. The service owns the model; this adapter
//! only carries the wire format.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::capture::frame::CapturedFrame;

use super::{OcrError, OcrProvider, RawDetection};

/// OCR provider backed by an HTTP detection service
pub struct HttpOcrProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct OcrServiceRequest<'a> {
    image: &'a str,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct OcrServiceResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

impl HttpOcrProvider {
    /// Create a provider targeting `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn encode_frame(frame: &CapturedFrame) -> Result<String, OcrError> {
        let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| OcrError::Encode("frame buffer size mismatch".to_string()))?;
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .map_err(|e| OcrError::Encode(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }
}

#[async_trait]
impl OcrProvider for HttpOcrProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn recognize(&self, frame: &CapturedFrame) -> Result<Vec<RawDetection>, OcrError> {
        let encoded = Self::encode_frame(frame)?;
        let request = OcrServiceRequest {
            image: &encoded,
            width: frame.width,
            height: frame.height,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OcrError::Request(format!(
                "detection service returned {}",
                response.status()
            )));
        }

        let parsed: OcrServiceResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Decode(e.to_string()))?;

        debug!(count = parsed.detections.len(), "ocr service responded");
        Ok(parsed.detections)
    }
}
