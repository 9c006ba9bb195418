//! Block Identity Tracker
//!
//! OCR provides no persistent key, so identities are re-established every
//! frame by greatest bbox overlap (IoU) against the previous frame's
//! blocks. Each identity runs a Forming -> Settled -> Stale state machine:
//! a block settles once its text and position have held still for the
//! configured number of consecutive frames, and only settled blocks are
//! handed to the translation request builder. Content churn restarts the
//! debounce and bumps the identity's generation, which is what lets
//! late-arriving translation results be recognized as stale.

use strsim::normalized_levenshtein;
use tracing::debug;

use crate::config::EngineConfig;

use super::cluster::{BlockColor, CandidateBlock};
use super::geometry::Rect;
use super::orientation::Orientation;

/// Stable identity of a tracked block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Lifecycle state of a tracked block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Content still changing; not safe to translate
    Forming,
    /// Stable long enough to translate
    Settled,
    /// Unmatched beyond the grace period; removed this frame
    Stale,
}

/// A block identity carried across frames
#[derive(Debug, Clone)]
pub struct TrackedBlock {
    pub id: BlockId,
    /// Bumped whenever the block's text changes; stale-response guard
    pub generation: u64,
    pub state: BlockState,
    /// Consecutive frames observed unchanged
    pub settle_count: u32,
    /// Consecutive frames without a matching candidate
    pub missed_frames: u32,
    pub text: String,
    pub rect: Rect,
    pub orientation: Orientation,
    pub confidence: Option<f32>,
    pub color: BlockColor,
    /// Applied translation for the current generation
    pub translation: Option<String>,
}

/// A block that transitioned into Settled this frame
#[derive(Debug, Clone)]
pub struct SettledBlock {
    pub id: BlockId,
    pub generation: u64,
    pub text: String,
    pub rect: Rect,
}

/// Outcome of reconciling one frame
#[derive(Debug, Default)]
pub struct FrameUpdate {
    /// Identities that settled (or re-settled) this frame
    pub settled: Vec<SettledBlock>,
    /// Identities that went stale and were removed
    pub removed: Vec<BlockId>,
}

/// Result of applying an asynchronous translation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The block's generation moved on; result must be discarded
    StaleGeneration,
    /// The identity no longer exists
    UnknownBlock,
}

/// Cross-frame identity tracker for one capture region
#[derive(Debug, Default)]
pub struct BlockTracker {
    next_id: u64,
    blocks: Vec<TrackedBlock>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently tracked blocks, oldest identity first
    pub fn blocks(&self) -> &[TrackedBlock] {
        &self.blocks
    }

    pub fn get(&self, id: BlockId) -> Option<&TrackedBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Mutable access for enrichment passes (color backfill)
    pub fn blocks_mut(&mut self) -> &mut [TrackedBlock] {
        &mut self.blocks
    }

    /// Drop all identities (scene change)
    pub fn reset(&mut self) {
        self.blocks.clear();
    }

    /// Reconcile the current frame's candidates against tracked state.
    ///
    /// Matches greedily by descending IoU above the configured threshold,
    /// each candidate and each identity used at most once; ordering ties
    /// break by identity then candidate index so the outcome is
    /// deterministic.
    pub fn observe(&mut self, candidates: &[CandidateBlock], config: &EngineConfig) -> FrameUpdate {
        let mut update = FrameUpdate::default();

        let mut candidate_matched = vec![false; candidates.len()];
        let mut block_matched = vec![false; self.blocks.len()];

        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (b, block) in self.blocks.iter().enumerate() {
            for (c, candidate) in candidates.iter().enumerate() {
                let iou = block.rect.iou(&candidate.rect);
                if iou >= config.match_iou_threshold {
                    pairs.push((iou, b, c));
                }
            }
        }
        pairs.sort_by(|x, y| {
            y.0.total_cmp(&x.0)
                .then(x.1.cmp(&y.1))
                .then(x.2.cmp(&y.2))
        });

        for (_, b, c) in pairs {
            if block_matched[b] || candidate_matched[c] {
                continue;
            }
            block_matched[b] = true;
            candidate_matched[c] = true;
            if let Some(settled) = step_matched(&mut self.blocks[b], &candidates[c], config) {
                update.settled.push(settled);
            }
        }

        // Unmatched candidates start new identities.
        for (c, candidate) in candidates.iter().enumerate() {
            if candidate_matched[c] {
                continue;
            }
            let id = BlockId(self.next_id);
            self.next_id += 1;
            debug!(%id, text = %candidate.text, "new block identity");
            self.blocks.push(TrackedBlock {
                id,
                generation: 1,
                state: BlockState::Forming,
                settle_count: 0,
                missed_frames: 0,
                text: candidate.text.clone(),
                rect: candidate.rect,
                orientation: candidate.orientation,
                confidence: candidate.confidence,
                color: candidate.color.clone(),
                translation: None,
            });
        }

        // Unmatched identities age toward Stale; within the grace period
        // they keep state and settle count untouched.
        let mut survivors = Vec::with_capacity(self.blocks.len());
        for (b, mut block) in std::mem::take(&mut self.blocks).into_iter().enumerate() {
            let seen = block_matched.get(b).copied().unwrap_or(true);
            if seen {
                block.missed_frames = 0;
                survivors.push(block);
            } else {
                block.missed_frames += 1;
                if block.missed_frames > config.miss_grace_frames {
                    block.state = BlockState::Stale;
                    debug!(id = %block.id, "block went stale");
                    update.removed.push(block.id);
                } else {
                    survivors.push(block);
                }
            }
        }
        self.blocks = survivors;

        update
    }

    /// Apply an asynchronous translation result to a block, guarding
    /// against superseded generations.
    pub fn apply_translation(
        &mut self,
        id: BlockId,
        generation: u64,
        text: impl Into<String>,
    ) -> ApplyOutcome {
        match self.blocks.iter_mut().find(|b| b.id == id) {
            None => ApplyOutcome::UnknownBlock,
            Some(block) if block.generation != generation => ApplyOutcome::StaleGeneration,
            Some(block) => {
                block.translation = Some(text.into());
                ApplyOutcome::Applied
            }
        }
    }
}

/// Advance a matched identity one frame; returns the settle event when the
/// block transitions into Settled.
fn step_matched(
    block: &mut TrackedBlock,
    candidate: &CandidateBlock,
    config: &EngineConfig,
) -> Option<SettledBlock> {
    let text_unchanged = texts_match(&block.text, &candidate.text, config);
    let position_stable = block.rect.center_distance(&candidate.rect) < config.center_epsilon;

    let mut settled_event = None;
    if text_unchanged && position_stable {
        block.settle_count += 1;
        if block.state == BlockState::Forming && block.settle_count >= config.settle_frames {
            block.state = BlockState::Settled;
            settled_event = Some(SettledBlock {
                id: block.id,
                generation: block.generation,
                text: candidate.text.clone(),
                rect: candidate.rect,
            });
        }
    } else {
        block.settle_count = 0;
        if !text_unchanged {
            block.generation += 1;
            block.translation = None;
            if block.state == BlockState::Settled {
                debug!(id = %block.id, "settled block changed, re-forming");
                block.state = BlockState::Forming;
            }
        }
    }

    block.text = candidate.text.clone();
    block.rect = candidate.rect;
    block.orientation = candidate.orientation;
    block.confidence = candidate.confidence;
    block.color = candidate.color.clone();
    block.missed_frames = 0;

    settled_event
}

/// "Unchanged" text check. At the default threshold of 1.0 this is exact
/// equality; lower thresholds absorb single-glyph OCR flicker.
fn texts_match(previous: &str, current: &str, config: &EngineConfig) -> bool {
    if config.text_similarity_threshold >= 1.0 {
        previous == current
    } else {
        normalized_levenshtein(previous, current) >= config.text_similarity_threshold
    }
}
