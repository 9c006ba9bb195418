//! Screen Capture Layer
//!
//! Frames enter the engine through the `FrameSource` collaborator boundary.
//! Platform capture backends (Windows Graphics Capture, PipeWire, ...) live
//! outside this crate and only need to hand over RGBA frames.

pub mod frame;

use anyhow::Result;

use frame::CapturedFrame;

/// Screen region to capture, in desktop pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        }
    }
}

/// Source of captured frames for one region.
///
/// Implemented outside this crate by the platform capture collaborator; the
/// built-in `TestPatternSource` exists for mock runs and tests.
pub trait FrameSource: Send {
    /// Produce the next frame for the configured region
    fn next_frame(&mut self) -> Result<CapturedFrame>;
}

/// Frame source producing a solid-color test pattern
pub struct TestPatternSource {
    width: u32,
    height: u32,
    fill: [u8; 4],
}

impl TestPatternSource {
    /// Create a test source with the given dimensions and fill color
    pub fn new(width: u32, height: u32, fill: [u8; 4]) -> Self {
        Self {
            width,
            height,
            fill,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let mut data = Vec::with_capacity((self.width * self.height * 4) as usize);
        for _ in 0..(self.width * self.height) {
            data.extend_from_slice(&self.fill);
        }
        Ok(CapturedFrame::new(data, self.width, self.height))
    }
}
