//! Spatial Clustering (Block Builder)
//!
//! Groups normalized detections into candidate blocks through connectivity
//! of a proximity/alignment graph: two detections are connected when they
//! sit on the same line (or column) and the gap along the reading axis is
//! below a threshold derived from the grouping power and the frame's glyph
//! size. Grouping is transitive, so long runs of glyphs whose endpoints are
//! far apart still form one block. Construction is deterministic: the same
//! detection set produces the same blocks regardless of input order.

use crate::config::EngineConfig;
use crate::vision::{OrientationHint, RegionColor};

use super::geometry::Rect;
use super::normalize::Detection;
use super::orientation::{classify, Orientation};

/// Foreground/background estimate aggregated over block members
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockColor {
    pub foreground: Option<RegionColor>,
    pub background: Option<RegionColor>,
}

/// A geometric grouping of detections for one frame, before identity
/// tracking. `index` is assigned in deterministic discovery order and is
/// only meaningful within the frame.
#[derive(Debug, Clone)]
pub struct CandidateBlock {
    pub index: usize,
    /// Members in reading order
    pub members: Vec<Detection>,
    /// Union rectangle of all members
    pub rect: Rect,
    pub orientation: Orientation,
    /// Member text concatenated in reading order
    pub text: String,
    /// Mean member confidence, when any member reports one
    pub confidence: Option<f32>,
    pub color: BlockColor,
}

/// Group detections into candidate blocks.
pub fn build_blocks(mut detections: Vec<Detection>, config: &EngineConfig) -> Vec<CandidateBlock> {
    if detections.is_empty() {
        return Vec::new();
    }

    // Canonical order first: determinism must not depend on input order.
    detections.sort_by(|a, b| {
        a.rect
            .y
            .total_cmp(&b.rect.y)
            .then(a.rect.x.total_cmp(&b.rect.x))
            .then(a.text.cmp(&b.text))
    });

    let gap_limit = config.base_distance
        * (1.0 + config.grouping_power)
        * median_glyph_extent(&detections);

    let mut forest = UnionFind::new(detections.len());
    for i in 0..detections.len() {
        for j in (i + 1)..detections.len() {
            if compatible(&detections[i], &detections[j], gap_limit, config) {
                forest.union(i, j);
            }
        }
    }

    // Components emerge in order of their lowest member index.
    let mut component_order: Vec<usize> = Vec::new();
    let mut component_members: Vec<Vec<usize>> = vec![Vec::new(); detections.len()];
    for i in 0..detections.len() {
        let root = forest.find(i);
        if component_members[root].is_empty() {
            component_order.push(root);
        }
        component_members[root].push(i);
    }

    let mut blocks = Vec::with_capacity(component_order.len());
    for (index, root) in component_order.into_iter().enumerate() {
        let members: Vec<Detection> = component_members[root]
            .iter()
            .map(|&i| detections[i].clone())
            .collect();
        blocks.push(assemble_block(index, members, config));
    }

    blocks
}

/// Fraction of non-whitespace characters in the CJK ranges
pub fn cjk_ratio(text: &str) -> f32 {
    let mut cjk = 0usize;
    let mut total = 0usize;
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        total += 1;
        if matches!(
            ch as u32,
            0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0x3400..=0x4DBF
        ) {
            cjk += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        cjk as f32 / total as f32
    }
}

/// Median of min(width, height) over the frame's detections.
fn median_glyph_extent(detections: &[Detection]) -> f32 {
    let mut extents: Vec<f32> = detections
        .iter()
        .map(|d| d.rect.width.min(d.rect.height))
        .collect();
    extents.sort_by(f32::total_cmp);
    extents[extents.len() / 2]
}

/// Pair compatibility: same line with a small horizontal gap, or same
/// column with a small vertical gap. Detections rotated beyond the
/// configured tolerance never connect; they surface as singleton blocks.
fn compatible(a: &Detection, b: &Detection, gap_limit: f32, config: &EngineConfig) -> bool {
    let rotated = |d: &Detection| {
        d.rotation_deg
            .map(|r| r > config.rotation_tolerance_deg)
            .unwrap_or(false)
    };
    if rotated(a) || rotated(b) {
        return false;
    }

    let ra = &a.rect;
    let rb = &b.rect;

    let same_line = ra.y_overlap(rb) >= config.alignment_overlap * ra.height.min(rb.height)
        && ra.x_gap(rb) <= gap_limit;
    let same_column = ra.x_overlap(rb) >= config.alignment_overlap * ra.width.min(rb.width)
        && ra.y_gap(rb) <= gap_limit;

    same_line || same_column
}

fn assemble_block(index: usize, members: Vec<Detection>, config: &EngineConfig) -> CandidateBlock {
    let rect = members
        .iter()
        .skip(1)
        .fold(members[0].rect, |acc, d| acc.union(&d.rect));

    let orientation = block_orientation(&members, &rect, config);
    let ordered = order_members(members, orientation);
    let text = assemble_text(&ordered, orientation);
    let confidence = mean_confidence(&ordered);
    let color = aggregate_color(&ordered);

    CandidateBlock {
        index,
        members: ordered,
        rect,
        orientation,
        text,
        confidence,
        color,
    }
}

/// Members vote through their backend hints; without a hint majority the
/// union rectangle's aspect decides. Per-member aspect ratios are not used
/// here: a column of square glyphs is vertical even though every glyph on
/// its own would classify horizontal.
fn block_orientation(members: &[Detection], rect: &Rect, config: &EngineConfig) -> Orientation {
    let mut vertical = 0usize;
    let mut horizontal = 0usize;
    for member in members {
        match member.hint {
            Some(OrientationHint::Vertical) => vertical += 1,
            Some(OrientationHint::Horizontal) => horizontal += 1,
            None => {}
        }
    }
    if vertical > horizontal {
        Orientation::Vertical
    } else if horizontal > vertical {
        Orientation::Horizontal
    } else {
        classify(rect.width, rect.height, config.vertical_aspect_threshold)
    }
}

/// Order members in reading order: horizontal text line-by-line
/// (top-to-bottom, left-to-right within a line), vertical text
/// column-major (columns right-to-left, top-to-bottom within a column).
fn order_members(mut members: Vec<Detection>, orientation: Orientation) -> Vec<Detection> {
    members.sort_by(|a, b| {
        a.rect
            .y
            .total_cmp(&b.rect.y)
            .then(a.rect.x.total_cmp(&b.rect.x))
    });

    match orientation {
        Orientation::Horizontal => {
            let mut lines: Vec<(Rect, Vec<Detection>)> = Vec::new();
            for det in members {
                match lines.iter_mut().find(|(rect, _)| {
                    rect.y_overlap(&det.rect) >= 0.5 * rect.height.min(det.rect.height)
                }) {
                    Some((rect, line)) => {
                        *rect = rect.union(&det.rect);
                        line.push(det);
                    }
                    None => lines.push((det.rect, vec![det])),
                }
            }
            lines.sort_by(|a, b| a.0.y.total_cmp(&b.0.y));
            let mut ordered = Vec::new();
            for (_, mut line) in lines {
                line.sort_by(|a, b| a.rect.x.total_cmp(&b.rect.x));
                ordered.extend(line);
            }
            ordered
        }
        Orientation::Vertical => {
            let mut columns: Vec<(Rect, Vec<Detection>)> = Vec::new();
            for det in members {
                match columns.iter_mut().find(|(rect, _)| {
                    rect.x_overlap(&det.rect) >= 0.5 * rect.width.min(det.rect.width)
                }) {
                    Some((rect, column)) => {
                        *rect = rect.union(&det.rect);
                        column.push(det);
                    }
                    None => columns.push((det.rect, vec![det])),
                }
            }
            // Rightmost column reads first.
            columns.sort_by(|a, b| b.0.x.total_cmp(&a.0.x));
            let mut ordered = Vec::new();
            for (_, mut column) in columns {
                column.sort_by(|a, b| a.rect.y.total_cmp(&b.rect.y));
                ordered.extend(column);
            }
            ordered
        }
    }
}

fn assemble_text(members: &[Detection], orientation: Orientation) -> String {
    let joined: String = members
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("");
    match orientation {
        Orientation::Vertical => joined,
        Orientation::Horizontal => {
            if cjk_ratio(&joined) >= 0.5 {
                joined
            } else {
                members
                    .iter()
                    .map(|m| m.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

fn mean_confidence(members: &[Detection]) -> Option<f32> {
    let values: Vec<f32> = members.iter().filter_map(|m| m.confidence).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

/// Colors come from the largest member that reports them.
fn aggregate_color(members: &[Detection]) -> BlockColor {
    let mut best: Option<&Detection> = None;
    for member in members {
        if member.foreground.is_none() && member.background.is_none() {
            continue;
        }
        if best
            .map(|b| member.rect.area() > b.rect.area())
            .unwrap_or(true)
        {
            best = Some(member);
        }
    }
    match best {
        Some(member) => BlockColor {
            foreground: member.foreground,
            background: member.background,
        },
        None => BlockColor::default(),
    }
}

/// Stable union-find with path compression; the smaller index always wins
/// the root so component identity does not depend on union order.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = i;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[high] = low;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::RawDetection;

    fn det(text: &str, x: f32, y: f32, w: f32, h: f32) -> Detection {
        let (mut cleaned, _) = super::super::normalize::normalize(vec![RawDetection::new(
            text, x, y, w, h,
        )]);
        cleaned.remove(0)
    }

    fn texts(blocks: &[CandidateBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.text.clone()).collect()
    }

    #[test]
    fn test_adjacent_glyphs_form_one_block() {
        let config = EngineConfig::default();
        let blocks = build_blocks(
            vec![
                det("he", 0.0, 0.0, 20.0, 20.0),
                det("llo", 22.0, 0.0, 20.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "he llo");
        assert_eq!(blocks[0].orientation, Orientation::Horizontal);
        assert_eq!(blocks[0].rect, Rect::new(0.0, 0.0, 42.0, 20.0));
    }

    #[test]
    fn test_transitive_chain_groups_endpoints() {
        let config = EngineConfig::default();
        // a-b and b-c are adjacent; a-c alone would not qualify.
        let blocks = build_blocks(
            vec![
                det("a", 0.0, 0.0, 20.0, 20.0),
                det("b", 22.0, 0.0, 20.0, 20.0),
                det("c", 44.0, 0.0, 20.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].members.len(), 3);
        assert_eq!(blocks[0].text, "a b c");
    }

    #[test]
    fn test_distant_detections_stay_separate() {
        let config = EngineConfig::default();
        let blocks = build_blocks(
            vec![
                det("near", 0.0, 0.0, 20.0, 20.0),
                det("far", 400.0, 0.0, 20.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_misaligned_rows_do_not_connect() {
        let config = EngineConfig::default();
        // Horizontally close but with almost no vertical overlap.
        let blocks = build_blocks(
            vec![
                det("up", 0.0, 0.0, 20.0, 20.0),
                det("down", 22.0, 18.0, 20.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_deterministic_under_input_shuffle() {
        let config = EngineConfig::default();
        let original = vec![
            det("a", 0.0, 0.0, 20.0, 20.0),
            det("b", 22.0, 0.0, 20.0, 20.0),
            det("c", 300.0, 50.0, 20.0, 20.0),
            det("d", 322.0, 50.0, 20.0, 20.0),
            det("e", 0.0, 200.0, 20.0, 20.0),
        ];
        let mut shuffled = original.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        let a = build_blocks(original, &config);
        let b = build_blocks(shuffled, &config);

        assert_eq!(texts(&a), texts(&b));
        let rects_a: Vec<Rect> = a.iter().map(|blk| blk.rect).collect();
        let rects_b: Vec<Rect> = b.iter().map(|blk| blk.rect).collect();
        assert_eq!(rects_a, rects_b);
    }

    #[test]
    fn test_partition_invariant() {
        let config = EngineConfig::default();
        let detections = vec![
            det("a", 0.0, 0.0, 20.0, 20.0),
            det("b", 22.0, 0.0, 20.0, 20.0),
            det("c", 100.0, 100.0, 20.0, 20.0),
            det("d", 200.0, 200.0, 20.0, 20.0),
        ];
        let total = detections.len();
        let blocks = build_blocks(detections, &config);

        let member_count: usize = blocks.iter().map(|b| b.members.len()).sum();
        assert_eq!(member_count, total);

        let mut seen: Vec<&str> = blocks
            .iter()
            .flat_map(|b| b.members.iter().map(|m| m.text.as_str()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_vertical_column_reads_top_to_bottom() {
        let config = EngineConfig::default();
        let blocks = build_blocks(
            vec![
                det("二", 0.0, 22.0, 20.0, 20.0),
                det("一", 0.0, 0.0, 20.0, 20.0),
                det("三", 0.0, 44.0, 20.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].orientation, Orientation::Vertical);
        assert_eq!(blocks[0].text, "一二三");
    }

    #[test]
    fn test_vertical_columns_read_right_to_left() {
        let config = EngineConfig::default();
        // Two four-glyph columns; the right column reads first.
        let mut detections = Vec::new();
        for (x, label) in [(22.0, "r"), (0.0, "l")] {
            for row in 0..4 {
                detections.push(det(
                    &format!("{label}{row}"),
                    x,
                    row as f32 * 22.0,
                    20.0,
                    20.0,
                ));
            }
        }
        let blocks = build_blocks(detections, &config);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].orientation, Orientation::Vertical);
        assert_eq!(blocks[0].text, "r0r1r2r3l0l1l2l3");
    }

    #[test]
    fn test_horizontal_lines_read_top_to_bottom() {
        let config = EngineConfig::default();
        let blocks = build_blocks(
            vec![
                det("second", 0.0, 22.0, 60.0, 20.0),
                det("line", 64.0, 22.0, 40.0, 20.0),
                det("first", 0.0, 0.0, 50.0, 20.0),
                det("line", 54.0, 0.0, 40.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].orientation, Orientation::Horizontal);
        assert_eq!(blocks[0].text, "first line second line");
    }

    #[test]
    fn test_cjk_horizontal_text_joins_without_spaces() {
        let config = EngineConfig::default();
        let blocks = build_blocks(
            vec![
                det("こん", 0.0, 0.0, 20.0, 20.0),
                det("にちは", 22.0, 0.0, 30.0, 20.0),
            ],
            &config,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "こんにちは");
    }

    #[test]
    fn test_hint_majority_overrides_union_aspect() {
        let config = EngineConfig::default();
        let mut a = det("a", 0.0, 0.0, 20.0, 20.0);
        let mut b = det("b", 22.0, 0.0, 20.0, 20.0);
        a.hint = Some(OrientationHint::Vertical);
        b.hint = Some(OrientationHint::Vertical);
        let blocks = build_blocks(vec![a, b], &config);
        assert_eq!(blocks[0].orientation, Orientation::Vertical);
    }

    #[test]
    fn test_rotated_detection_stays_singleton() {
        let config = EngineConfig::default();
        let mut tilted = det("tilted", 22.0, 0.0, 20.0, 20.0);
        tilted.rotation_deg = Some(30.0);
        let blocks = build_blocks(vec![det("flat", 0.0, 0.0, 20.0, 20.0), tilted], &config);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_mean_confidence_ignores_missing() {
        let config = EngineConfig::default();
        let mut a = det("a", 0.0, 0.0, 20.0, 20.0);
        let b = det("b", 22.0, 0.0, 20.0, 20.0);
        a.confidence = Some(0.8);
        let blocks = build_blocks(vec![a, b], &config);
        assert_eq!(blocks[0].confidence, Some(0.8));
    }
}
