//! Overlap Resolver
//!
//! Removes redundant candidate blocks: when two blocks intersect by more
//! than the allowed percentage of the smaller block's area, the smaller
//! block is discarded. This collapses nested proposals (a sub-line plus
//! its containing paragraph) into one block. The check is the naive
//! pairwise O(n^2) definition; frames carry tens of blocks at most.

use tracing::debug;

use crate::config::EngineConfig;

use super::cluster::CandidateBlock;

/// Resolve overlapping candidate blocks.
///
/// Returns the surviving blocks (input order preserved) and the number of
/// discarded blocks. Ties on area are broken by lower confidence, then by
/// larger candidate index, so resolution is deterministic.
pub fn resolve_overlaps(
    blocks: Vec<CandidateBlock>,
    config: &EngineConfig,
) -> (Vec<CandidateBlock>, u64) {
    if blocks.len() < 2 {
        return (blocks, 0);
    }

    let allowed = config.overlap_allowed_percent / 100.0;
    let mut keep = vec![true; blocks.len()];

    // Winners first: larger area, then higher confidence, then lower index.
    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&a, &b| {
        blocks[b]
            .rect
            .area()
            .total_cmp(&blocks[a].rect.area())
            .then(
                blocks[b]
                    .confidence
                    .unwrap_or(0.0)
                    .total_cmp(&blocks[a].confidence.unwrap_or(0.0)),
            )
            .then(blocks[a].index.cmp(&blocks[b].index))
    });

    let mut discarded = 0u64;
    for (pos, &winner) in order.iter().enumerate() {
        if !keep[winner] {
            continue;
        }
        for &loser in &order[pos + 1..] {
            if !keep[loser] {
                continue;
            }
            let smaller_area = blocks[loser].rect.area().min(blocks[winner].rect.area());
            if smaller_area <= 0.0 {
                continue;
            }
            let intersection = blocks[winner].rect.intersection_area(&blocks[loser].rect);
            if intersection / smaller_area > allowed {
                keep[loser] = false;
                discarded += 1;
                debug!(
                    winner = blocks[winner].index,
                    loser = blocks[loser].index,
                    "discarding overlapped block"
                );
            }
        }
    }

    let survivors = blocks
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, b)| b)
        .collect();
    (survivors, discarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::cluster::BlockColor;
    use crate::blocks::geometry::Rect;
    use crate::blocks::orientation::Orientation;

    fn block(index: usize, rect: Rect, confidence: Option<f32>) -> CandidateBlock {
        CandidateBlock {
            index,
            members: Vec::new(),
            rect,
            orientation: Orientation::Horizontal,
            text: format!("block{index}"),
            confidence,
            color: BlockColor::default(),
        }
    }

    #[test]
    fn test_nested_block_is_discarded() {
        let config = EngineConfig {
            overlap_allowed_percent: 50.0,
            ..Default::default()
        };
        // B fully inside A: overlap is 100% of B.
        let a = block(0, Rect::new(0.0, 0.0, 10.0, 10.0), None);
        let b = block(1, Rect::new(1.0, 1.0, 9.0, 9.0), None);
        let (kept, discarded) = resolve_overlaps(vec![a, b], &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
        assert_eq!(discarded, 1);
    }

    #[test]
    fn test_overlap_below_threshold_keeps_both() {
        let config = EngineConfig {
            overlap_allowed_percent: 50.0,
            ..Default::default()
        };
        // Intersection 4x10 = 40, 40% of the smaller 10x10 block.
        let a = block(0, Rect::new(0.0, 0.0, 20.0, 10.0), None);
        let b = block(1, Rect::new(16.0, 0.0, 10.0, 10.0), None);
        let (kept, discarded) = resolve_overlaps(vec![a, b], &config);
        assert_eq!(kept.len(), 2);
        assert_eq!(discarded, 0);
    }

    #[test]
    fn test_disjoint_blocks_untouched() {
        let config = EngineConfig::default();
        let a = block(0, Rect::new(0.0, 0.0, 10.0, 10.0), None);
        let b = block(1, Rect::new(100.0, 100.0, 10.0, 10.0), None);
        let (kept, discarded) = resolve_overlaps(vec![a, b], &config);
        assert_eq!(kept.len(), 2);
        assert_eq!(discarded, 0);
    }

    #[test]
    fn test_equal_area_tie_breaks_by_confidence() {
        let config = EngineConfig {
            overlap_allowed_percent: 50.0,
            ..Default::default()
        };
        let a = block(0, Rect::new(0.0, 0.0, 10.0, 10.0), Some(0.4));
        let b = block(1, Rect::new(2.0, 0.0, 10.0, 10.0), Some(0.9));
        let (kept, _) = resolve_overlaps(vec![a, b], &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 1);
    }

    #[test]
    fn test_equal_area_and_confidence_drops_larger_index() {
        let config = EngineConfig {
            overlap_allowed_percent: 50.0,
            ..Default::default()
        };
        let a = block(0, Rect::new(0.0, 0.0, 10.0, 10.0), None);
        let b = block(1, Rect::new(2.0, 0.0, 10.0, 10.0), None);
        let (kept, _) = resolve_overlaps(vec![a, b], &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
    }

    #[test]
    fn test_chain_of_nested_blocks() {
        let config = EngineConfig {
            overlap_allowed_percent: 50.0,
            ..Default::default()
        };
        let outer = block(0, Rect::new(0.0, 0.0, 100.0, 100.0), None);
        let middle = block(1, Rect::new(10.0, 10.0, 50.0, 50.0), None);
        let inner = block(2, Rect::new(20.0, 20.0, 10.0, 10.0), None);
        let (kept, discarded) = resolve_overlaps(vec![outer, middle, inner], &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].index, 0);
        assert_eq!(discarded, 2);
    }
}
