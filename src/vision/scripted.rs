//! Scripted OCR provider
//!
//! Replays a fixed sequence of detection frames, holding the last frame
//! once the script runs out. Backs `--mock` runs and the session tests;
//! real inference never happens here.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capture::frame::CapturedFrame;

use super::{OcrError, OcrProvider, RawDetection};

/// OCR provider replaying pre-scripted detection frames
pub struct ScriptedOcr {
    frames: Mutex<ScriptState>,
}

struct ScriptState {
    pending: Vec<Vec<RawDetection>>,
    cursor: usize,
}

impl ScriptedOcr {
    /// Replay `frames` in order, then keep returning the final frame
    pub fn sequence(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames: Mutex::new(ScriptState {
                pending: frames,
                cursor: 0,
            }),
        }
    }

    /// Return the same detections on every cycle
    pub fn repeating(detections: Vec<RawDetection>) -> Self {
        Self::sequence(vec![detections])
    }
}

#[async_trait]
impl OcrProvider for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(&self, _frame: &CapturedFrame) -> Result<Vec<RawDetection>, OcrError> {
        let mut state = self.frames.lock();
        if state.pending.is_empty() {
            return Ok(Vec::new());
        }
        let index = state.cursor.min(state.pending.len() - 1);
        if state.cursor < state.pending.len() {
            state.cursor += 1;
        }
        Ok(state.pending[index].clone())
    }
}
