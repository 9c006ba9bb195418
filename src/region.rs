//! Region Session
//!
//! One tracked screen region owns one session: the identity tracker and
//! context buffer are the only mutable state that crosses cycle
//! boundaries, and both live here. The session is driven strictly
//! sequentially by its producer cycle (single-writer discipline); the
//! pipeline itself stays a pure function of the frame's detections plus
//! this state.

use tracing::debug;
use uuid::Uuid;

use crate::blocks::{
    assemble_blocks, ApplyOutcome, BlockColor, BlockId, BlockTracker, ContextBuffer,
};
use crate::capture::frame::CapturedFrame;
use crate::capture::CaptureRegion;
use crate::config::{AppConfig, ContextSettings, EngineConfig};
use crate::overlay::{BlockSnapshot, RegionSnapshot};
use crate::translate::{BlockText, TranslationRequest};
use crate::vision::{sample_region_colors, RawDetection};

/// Monotonic per-region counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub cycles: u64,
    pub malformed_dropped: u64,
    pub overlap_discarded: u64,
    pub undersized_discarded: u64,
    pub stale_discarded: u64,
    pub translations_applied: u64,
}

/// Per-region engine state and translation bookkeeping
pub struct RegionSession {
    id: Uuid,
    region: CaptureRegion,
    engine: EngineConfig,
    context_settings: ContextSettings,
    target_language: String,
    tracker: BlockTracker,
    context: ContextBuffer,
    stats: EngineStats,
}

impl RegionSession {
    /// Create a session for one capture region
    pub fn new(region: CaptureRegion, config: &AppConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            region,
            engine: config.engine.clone(),
            context_settings: config.context.clone(),
            target_language: config.translation.target_language.clone(),
            tracker: BlockTracker::new(),
            context: ContextBuffer::new(config.context.max_chars, config.context.max_entries),
            stats: EngineStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Run one capture cycle's detections through the block pipeline and
    /// the identity tracker. Returns a translation request when blocks
    /// settled this frame.
    pub fn process_frame(&mut self, raw: Vec<RawDetection>) -> Option<TranslationRequest> {
        let (candidates, frame_stats) = assemble_blocks(raw, &self.engine);
        self.stats.cycles += 1;
        self.stats.malformed_dropped += frame_stats.malformed_dropped;
        self.stats.overlap_discarded += frame_stats.overlap_discarded;
        self.stats.undersized_discarded += frame_stats.undersized_discarded;

        let update = self.tracker.observe(&candidates, &self.engine);
        if update.settled.is_empty() {
            return None;
        }

        let blocks = update
            .settled
            .iter()
            .map(|s| BlockText {
                id: s.id,
                generation: s.generation,
                text: s.text.clone(),
                rect: s.rect,
            })
            .collect();

        Some(TranslationRequest {
            blocks,
            context: self.context.render(),
            target_language: self.target_language.clone(),
        })
    }

    /// Join an asynchronous translation result back onto its block.
    ///
    /// Results whose generation no longer matches are discarded silently
    /// and counted; accepted translations of sufficiently long blocks
    /// enter the context history.
    pub fn apply_translation(
        &mut self,
        id: BlockId,
        generation: u64,
        text: String,
    ) -> ApplyOutcome {
        let outcome = self.tracker.apply_translation(id, generation, text.clone());
        match outcome {
            ApplyOutcome::Applied => {
                self.stats.translations_applied += 1;
                let source_len = self
                    .tracker
                    .get(id)
                    .map(|b| b.text.chars().count())
                    .unwrap_or(0);
                if source_len >= self.context_settings.min_chars {
                    self.context.push(text);
                }
            }
            ApplyOutcome::StaleGeneration | ApplyOutcome::UnknownBlock => {
                self.stats.stale_discarded += 1;
                debug!(%id, generation, "discarding superseded translation result");
            }
        }
        outcome
    }

    /// Estimate colors from the frame for blocks the OCR backend left
    /// colorless, keyed on each block's bbox.
    pub fn fill_missing_colors(&mut self, frame: &CapturedFrame) {
        for block in self.tracker.blocks_mut() {
            if block.color.foreground.is_some() || block.color.background.is_some() {
                continue;
            }
            let x = block.rect.x.max(0.0) as u32;
            let y = block.rect.y.max(0.0) as u32;
            let width = block.rect.width.max(0.0) as u32;
            let height = block.rect.height.max(0.0) as u32;
            if let Some(sample) = sample_region_colors(frame, x, y, width, height) {
                block.color = BlockColor {
                    foreground: Some(sample.foreground),
                    background: Some(sample.background),
                };
            }
        }
    }

    /// Snapshot of the current blocks for the rendering collaborator
    pub fn snapshot(&self) -> RegionSnapshot {
        RegionSnapshot {
            region_id: self.id,
            region: self.region,
            blocks: self
                .tracker
                .blocks()
                .iter()
                .map(|b| BlockSnapshot {
                    id: b.id,
                    rect: b.rect,
                    orientation: b.orientation,
                    text: b.text.clone(),
                    translation: b.translation.clone(),
                    color: b.color.clone(),
                    state: b.state,
                })
                .collect(),
        }
    }

    /// Drop the context history (scene change)
    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Forget all block identities and history
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockState;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.engine.settle_frames = 3;
        config.context.min_chars = 8;
        config
    }

    fn detections(text: &str) -> Vec<RawDetection> {
        vec![RawDetection::new(text, 10.0, 10.0, 200.0, 24.0)]
    }

    fn session() -> RegionSession {
        RegionSession::new(CaptureRegion::default(), &config())
    }

    #[test]
    fn test_settled_block_produces_request() {
        let mut session = session();

        for _ in 0..3 {
            assert!(session.process_frame(detections("a settled line")).is_none());
        }
        let request = session
            .process_frame(detections("a settled line"))
            .expect("block should settle on the configured frame");

        assert_eq!(request.blocks.len(), 1);
        assert_eq!(request.blocks[0].text, "a settled line");
        assert_eq!(request.target_language, "en");
        assert!(request.context.is_empty());
    }

    #[test]
    fn test_applied_translation_reaches_snapshot_and_context() {
        let mut session = session();

        for _ in 0..3 {
            session.process_frame(detections("hello wonderful world"));
        }
        let request = session
            .process_frame(detections("hello wonderful world"))
            .unwrap();
        let block = &request.blocks[0];

        let outcome = session.apply_translation(block.id, block.generation, "bonjour".to_string());
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(session.stats().translations_applied, 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.blocks.len(), 1);
        assert_eq!(snapshot.blocks[0].state, BlockState::Settled);
        assert_eq!(snapshot.blocks[0].translation.as_deref(), Some("bonjour"));

        // The accepted translation becomes context for the next request.
        let mut far = detections("hello wonderful world");
        far.push(RawDetection::new(
            "another long line",
            10.0,
            400.0,
            200.0,
            24.0,
        ));
        for _ in 0..3 {
            assert!(session.process_frame(far.clone()).is_none());
        }
        let request = session.process_frame(far).unwrap();
        assert_eq!(request.context, "bonjour");
    }

    #[test]
    fn test_stale_generation_result_is_discarded() {
        let mut session = session();

        for _ in 0..3 {
            session.process_frame(detections("generation one"));
        }
        let request = session.process_frame(detections("generation one")).unwrap();
        let block = &request.blocks[0];
        let (id, old_generation) = (block.id, block.generation);

        // Text mutates before the in-flight result lands.
        session.process_frame(detections("generation two"));

        let outcome = session.apply_translation(id, old_generation, "too late".to_string());
        assert_eq!(outcome, ApplyOutcome::StaleGeneration);
        assert_eq!(session.stats().stale_discarded, 1);
        assert!(session.snapshot().blocks[0].translation.is_none());
        // Nothing entered the context history either.
        assert!(session.context.is_empty());
    }

    #[test]
    fn test_short_blocks_stay_out_of_context() {
        let mut session = session();

        // Button-sized text settles and translates, but never enters the
        // context history.
        for _ in 0..3 {
            assert!(session.process_frame(detections("OK")).is_none());
        }
        let request = session.process_frame(detections("OK")).unwrap();
        let block = &request.blocks[0];

        let outcome = session.apply_translation(block.id, block.generation, "D'accord".to_string());
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(session.context.is_empty());
    }

    #[test]
    fn test_fill_missing_colors_samples_frame() {
        let mut session = session();
        session.process_frame(vec![RawDetection::new("text", 0.0, 0.0, 16.0, 16.0)]);

        // 16x16 frame: black with a white band under the block.
        let mut data = vec![0u8; 16 * 16 * 4];
        for y in 6..10 {
            for x in 0..16 {
                let idx = (y * 16 + x) * 4;
                data[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let frame = CapturedFrame::new(data, 16, 16);

        session.fill_missing_colors(&frame);
        let snapshot = session.snapshot();
        let color = &snapshot.blocks[0].color;
        assert_eq!(color.background.unwrap().rgb, [0, 0, 0]);
        assert_eq!(color.foreground.unwrap().rgb, [255, 255, 255]);
    }

    #[test]
    fn test_reset_forgets_identities_and_context() {
        let mut session = session();
        for _ in 0..4 {
            session.process_frame(detections("something stable"));
        }
        session.reset();
        assert!(session.snapshot().blocks.is_empty());
        assert!(session.context.is_empty());
    }
}
