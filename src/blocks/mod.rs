//! Block Detection & Context Assembly core
//!
//! Turns one frame's raw OCR detections into candidate text blocks:
//! normalize -> cluster -> resolve overlaps -> drop undersized. The whole
//! stage is synchronous and pure with respect to its inputs; cross-frame
//! state lives in the `tracker` and `context` submodules and is owned by
//! the region session.

pub mod cluster;
pub mod context;
pub mod geometry;
pub mod normalize;
pub mod orientation;
pub mod overlap;
pub mod tracker;

use tracing::debug;

use crate::config::EngineConfig;
use crate::vision::RawDetection;

pub use cluster::{BlockColor, CandidateBlock};
pub use context::{ContextBuffer, ContextEntry};
pub use geometry::Rect;
pub use normalize::Detection;
pub use orientation::Orientation;
pub use tracker::{
    ApplyOutcome, BlockId, BlockState, BlockTracker, FrameUpdate, SettledBlock, TrackedBlock,
};

/// Counters for one pipeline pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub detections_in: usize,
    pub malformed_dropped: u64,
    pub overlap_discarded: u64,
    pub undersized_discarded: u64,
    pub blocks_out: usize,
}

/// Run the per-frame block pipeline.
///
/// Every surviving detection ends up in exactly one candidate block;
/// detections discarded along the way belong to none.
pub fn assemble_blocks(
    raw: Vec<RawDetection>,
    config: &EngineConfig,
) -> (Vec<CandidateBlock>, FrameStats) {
    let detections_in = raw.len();

    let (cleaned, malformed_dropped) = normalize::normalize(raw);
    let candidates = cluster::build_blocks(cleaned, config);
    let (resolved, overlap_discarded) = overlap::resolve_overlaps(candidates, config);
    let (blocks, undersized_discarded) = filter_undersized(resolved, config);

    let stats = FrameStats {
        detections_in,
        malformed_dropped,
        overlap_discarded,
        undersized_discarded,
        blocks_out: blocks.len(),
    };
    debug!(
        detections = stats.detections_in,
        malformed = stats.malformed_dropped,
        overlapped = stats.overlap_discarded,
        undersized = stats.undersized_discarded,
        blocks = stats.blocks_out,
        "frame assembled"
    );

    (blocks, stats)
}

/// Drop blocks smaller than the configured minimum extent (noise,
/// furigana-like annotations).
fn filter_undersized(
    blocks: Vec<CandidateBlock>,
    config: &EngineConfig,
) -> (Vec<CandidateBlock>, u64) {
    let before = blocks.len();
    let kept: Vec<CandidateBlock> = blocks
        .into_iter()
        .filter(|b| {
            b.rect.width >= config.min_block_width && b.rect.height >= config.min_block_height
        })
        .collect();
    let dropped = (before - kept.len()) as u64;
    (kept, dropped)
}
