//! Ruling-line table detection.
//!
//! Tables are found from painted strokes only ("lattice" detection): the
//! page's straight segments become horizontal and vertical edges, edges are
//! snapped and joined, their intersections are turned into cells, and cells
//! sharing corners are grouped into tables. Cell text comes from the words
//! whose centre falls inside each cell.

use pdf2md_core::{BBox, CellValue, TableGrid, Word};

use super::layout::Segment;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// A table found on a page, in top-left page space.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
}

/// Tuning knobs for lattice detection. All values are in points.
#[derive(Debug, Clone)]
pub struct LatticeConfig {
    /// Segments whose two ends differ by at most this much on one axis are
    /// treated as axis-aligned.
    pub orientation_tolerance: f64,
    /// Parallel edges closer than this are snapped onto their mean position.
    pub snap_tolerance: f64,
    /// Collinear edges separated by a gap up to this size are merged.
    pub join_tolerance: f64,
    /// Edges shorter than this are discarded.
    pub min_edge_length: f64,
    /// How far an edge may fall short of another and still intersect it.
    pub intersection_tolerance: f64,
    /// Words whose tops differ by at most this much share a line in a cell.
    pub text_y_tolerance: f64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            orientation_tolerance: 0.5,
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            min_edge_length: 3.0,
            intersection_tolerance: 3.0,
            text_y_tolerance: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned edge. Horizontal edges have `top == bottom`, vertical
/// ones `x0 == x1`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    orientation: Orientation,
    x0: f64,
    x1: f64,
    top: f64,
    bottom: f64,
}

impl Edge {
    fn length(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.x1 - self.x0,
            Orientation::Vertical => self.bottom - self.top,
        }
    }
}

#[derive(Debug, Clone)]
struct Intersection {
    x: f64,
    y: f64,
    /// Indices of the horizontal edges through this point.
    h: Vec<usize>,
    /// Indices of the vertical edges through this point.
    v: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Detect tables from a page's painted segments. `media_box` is
/// `[llx, lly, urx, ury]` and maps user space onto top-left page space.
pub fn detect_tables(
    segments: &[Segment],
    media_box: [f32; 4],
    config: &LatticeConfig,
) -> Vec<DetectedTable> {
    let edges = to_edges(segments, media_box, config);
    let horizontal = merge_edges(
        edges
            .iter()
            .filter(|e| e.orientation == Orientation::Horizontal)
            .copied()
            .collect(),
        config,
    );
    let vertical = merge_edges(
        edges
            .iter()
            .filter(|e| e.orientation == Orientation::Vertical)
            .copied()
            .collect(),
        config,
    );

    let points = intersections(&horizontal, &vertical, config.intersection_tolerance);
    let cells = cells_from_intersections(&points);
    group_cells(cells)
}

/// Fill a table's cell grid from the page's words.
///
/// Rows are the distinct cell tops and columns the distinct cell lefts. A
/// grid position with no cell is `None`; a cell with no words is an empty
/// string.
pub fn extract_grid(cells: &[BBox], words: &[Word], config: &LatticeConfig) -> TableGrid {
    let mut tops: Vec<f64> = cells.iter().map(|c| c.top).collect();
    let mut lefts: Vec<f64> = cells.iter().map(|c| c.x0).collect();
    sort_dedup(&mut tops);
    sort_dedup(&mut lefts);

    tops.iter()
        .map(|&top| {
            lefts
                .iter()
                .map(|&x0| {
                    cells
                        .iter()
                        .find(|c| c.top == top && c.x0 == x0)
                        .map(|cell| CellValue::Text(cell_text(cell, words, config)))
                })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

fn to_edges(segments: &[Segment], media_box: [f32; 4], config: &LatticeConfig) -> Vec<Edge> {
    let llx = media_box[0] as f64;
    let ury = media_box[3] as f64;

    segments
        .iter()
        .filter_map(|s| {
            let (ax, ay) = (s.x0 as f64 - llx, ury - s.y0 as f64);
            let (bx, by) = (s.x1 as f64 - llx, ury - s.y1 as f64);

            let edge = if (ay - by).abs() <= config.orientation_tolerance {
                let y = (ay + by) / 2.0;
                Edge {
                    orientation: Orientation::Horizontal,
                    x0: ax.min(bx),
                    x1: ax.max(bx),
                    top: y,
                    bottom: y,
                }
            } else if (ax - bx).abs() <= config.orientation_tolerance {
                let x = (ax + bx) / 2.0;
                Edge {
                    orientation: Orientation::Vertical,
                    x0: x,
                    x1: x,
                    top: ay.min(by),
                    bottom: ay.max(by),
                }
            } else {
                return None;
            };

            (edge.length() >= config.min_edge_length).then_some(edge)
        })
        .collect()
}

/// Snap then join edges of a single orientation.
fn merge_edges(mut edges: Vec<Edge>, config: &LatticeConfig) -> Vec<Edge> {
    if edges.is_empty() {
        return edges;
    }
    let orientation = edges[0].orientation;

    let position = |e: &Edge| match orientation {
        Orientation::Horizontal => e.top,
        Orientation::Vertical => e.x0,
    };

    // Snap: cluster by position, then move every member to the cluster mean.
    edges.sort_by(|a, b| position(a).total_cmp(&position(b)));
    let mut snapped: Vec<Edge> = Vec::with_capacity(edges.len());
    let mut start = 0;
    for i in 1..=edges.len() {
        let ends_cluster =
            i == edges.len() || position(&edges[i]) - position(&edges[i - 1]) > config.snap_tolerance;
        if !ends_cluster {
            continue;
        }
        let cluster = &edges[start..i];
        let mean = cluster.iter().map(position).sum::<f64>() / cluster.len() as f64;
        snapped.extend(cluster.iter().map(|e| {
            let mut e = *e;
            match orientation {
                Orientation::Horizontal => {
                    e.top = mean;
                    e.bottom = mean;
                }
                Orientation::Vertical => {
                    e.x0 = mean;
                    e.x1 = mean;
                }
            }
            e
        }));
        start = i;
    }

    // Join: merge collinear edges that overlap or nearly touch.
    let span = |e: &Edge| match orientation {
        Orientation::Horizontal => (e.x0, e.x1),
        Orientation::Vertical => (e.top, e.bottom),
    };
    snapped.sort_by(|a, b| {
        position(a)
            .total_cmp(&position(b))
            .then(span(a).0.total_cmp(&span(b).0))
    });

    let mut joined: Vec<Edge> = Vec::new();
    for edge in snapped {
        if let Some(last) = joined.last_mut() {
            if position(&*last) == position(&edge)
                && span(&edge).0 <= span(&*last).1 + config.join_tolerance
            {
                match orientation {
                    Orientation::Horizontal => last.x1 = last.x1.max(edge.x1),
                    Orientation::Vertical => last.bottom = last.bottom.max(edge.bottom),
                }
                continue;
            }
        }
        joined.push(edge);
    }

    joined.retain(|e| e.length() >= config.min_edge_length);
    joined
}

// ---------------------------------------------------------------------------
// Intersections and cells
// ---------------------------------------------------------------------------

fn intersections(horizontal: &[Edge], vertical: &[Edge], tolerance: f64) -> Vec<Intersection> {
    let mut points: Vec<Intersection> = Vec::new();

    for (vi, v) in vertical.iter().enumerate() {
        for (hi, h) in horizontal.iter().enumerate() {
            let crosses = v.top - tolerance <= h.top
                && h.top <= v.bottom + tolerance
                && h.x0 - tolerance <= v.x0
                && v.x0 <= h.x1 + tolerance;
            if !crosses {
                continue;
            }

            let (x, y) = (v.x0, h.top);
            match points.iter_mut().find(|p| p.x == x && p.y == y) {
                Some(p) => {
                    p.h.push(hi);
                    p.v.push(vi);
                }
                None => points.push(Intersection {
                    x,
                    y,
                    h: vec![hi],
                    v: vec![vi],
                }),
            }
        }
    }

    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points
}

/// True when the two points lie on a common edge.
fn edge_connects(a: &Intersection, b: &Intersection) -> bool {
    if a.x == b.x {
        return a.v.iter().any(|i| b.v.contains(i));
    }
    if a.y == b.y {
        return a.h.iter().any(|i| b.h.contains(i));
    }
    false
}

/// For each intersection, the smallest cell whose other three corners are
/// also connected intersections.
fn cells_from_intersections(points: &[Intersection]) -> Vec<BBox> {
    let find = |x: f64, y: f64| points.iter().find(|p| p.x == x && p.y == y);

    let mut cells = Vec::new();
    for (i, pt) in points.iter().enumerate() {
        let rest = &points[i + 1..];
        let below: Vec<&Intersection> = rest.iter().filter(|p| p.x == pt.x).collect();
        let right: Vec<&Intersection> = rest.iter().filter(|p| p.y == pt.y).collect();

        'search: for b in &below {
            if !edge_connects(pt, b) {
                continue;
            }
            for r in &right {
                if !edge_connects(pt, r) {
                    continue;
                }
                let Some(corner) = find(r.x, b.y) else {
                    continue;
                };
                if edge_connects(corner, r) && edge_connects(corner, b) {
                    cells.push(BBox::new(pt.x, pt.y, corner.x, corner.y));
                    break 'search;
                }
            }
        }
    }
    cells
}

fn corners(cell: &BBox) -> [(f64, f64); 4] {
    [
        (cell.x0, cell.top),
        (cell.x0, cell.bottom),
        (cell.x1, cell.top),
        (cell.x1, cell.bottom),
    ]
}

/// Group cells that share corners. Single-cell groups are not tables.
fn group_cells(cells: Vec<BBox>) -> Vec<DetectedTable> {
    let mut remaining = cells;
    let mut groups: Vec<Vec<BBox>> = Vec::new();

    while !remaining.is_empty() {
        let mut group = vec![remaining.remove(0)];
        let mut group_corners: Vec<(f64, f64)> = corners(&group[0]).to_vec();

        loop {
            let before = group.len();
            let mut i = 0;
            while i < remaining.len() {
                let cell_corners = corners(&remaining[i]);
                if cell_corners.iter().any(|c| group_corners.contains(c)) {
                    let cell = remaining.remove(i);
                    group_corners.extend(cell_corners);
                    group.push(cell);
                } else {
                    i += 1;
                }
            }
            if group.len() == before {
                break;
            }
        }
        groups.push(group);
    }

    let mut tables: Vec<DetectedTable> = groups
        .into_iter()
        .filter(|cells| cells.len() > 1)
        .map(|cells| {
            let bbox = cells.iter().skip(1).fold(cells[0], |acc, c| {
                BBox::new(
                    acc.x0.min(c.x0),
                    acc.top.min(c.top),
                    acc.x1.max(c.x1),
                    acc.bottom.max(c.bottom),
                )
            });
            DetectedTable { bbox, cells }
        })
        .collect();

    tables.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    tables
}

// ---------------------------------------------------------------------------
// Cell text
// ---------------------------------------------------------------------------

fn cell_text(cell: &BBox, words: &[Word], config: &LatticeConfig) -> String {
    let mut lines: Vec<(f64, Vec<&str>)> = Vec::new();

    for word in words {
        let (cx, cy) = word.center();
        if !cell.contains_point(cx, cy) {
            continue;
        }
        match lines.last_mut() {
            Some((top, parts)) if (word.top - *top).abs() <= config.text_y_tolerance => {
                parts.push(&word.text)
            }
            _ => lines.push((word.top, vec![&word.text])),
        }
    }

    lines
        .into_iter()
        .map(|(_, parts)| parts.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sort_dedup(values: &mut Vec<f64>) {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

    fn seg(x0: f32, y0: f32, x1: f32, y1: f32) -> Segment {
        Segment { x0, y0, x1, y1 }
    }

    /// Rectangle outline in user space, as `re` + `S` would paint it.
    fn rect(x: f32, y: f32, w: f32, h: f32) -> Vec<Segment> {
        vec![
            seg(x, y, x + w, y),
            seg(x + w, y, x + w, y + h),
            seg(x + w, y + h, x, y + h),
            seg(x, y + h, x, y),
        ]
    }

    /// A 2x2 grid spanning x 100..300 and user-space y 660..700.
    fn grid_lines() -> Vec<Segment> {
        vec![
            seg(100.0, 700.0, 300.0, 700.0),
            seg(100.0, 680.0, 300.0, 680.0),
            seg(100.0, 660.0, 300.0, 660.0),
            seg(100.0, 660.0, 100.0, 700.0),
            seg(200.0, 660.0, 200.0, 700.0),
            seg(300.0, 660.0, 300.0, 700.0),
        ]
    }

    fn detect(segments: &[Segment]) -> Vec<DetectedTable> {
        detect_tables(segments, LETTER, &LatticeConfig::default())
    }

    fn word(text: &str, x0: f64, top: f64) -> Word {
        Word {
            text: text.to_string(),
            x0,
            x1: x0 + 5.0 * text.len() as f64,
            top,
            bottom: top + 10.0,
            size: 10.0,
            font_name: "Helvetica".to_string(),
        }
    }

    #[test]
    fn test_detect_simple_grid() {
        let tables = detect(&grid_lines());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].bbox, BBox::new(100.0, 92.0, 300.0, 132.0));
        assert_eq!(tables[0].cells.len(), 4);
        assert!(tables[0]
            .cells
            .contains(&BBox::new(200.0, 112.0, 300.0, 132.0)));
    }

    #[test]
    fn test_per_cell_rectangles_are_merged() {
        let mut segments = Vec::new();
        for (x, y) in [(100.0, 680.0), (200.0, 680.0), (100.0, 660.0), (200.0, 660.0)] {
            segments.extend(rect(x, y, 100.0, 20.0));
        }
        let tables = detect(&segments);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells.len(), 4);
    }

    #[test]
    fn test_near_miss_lines_are_snapped() {
        let mut segments = grid_lines();
        segments.push(seg(100.0, 681.5, 300.0, 681.5));
        let tables = detect(&segments);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells.len(), 4);
        assert!(tables[0]
            .cells
            .iter()
            .any(|c| (c.bottom - 111.25).abs() < 1e-9));
    }

    #[test]
    fn test_lines_falling_short_still_intersect() {
        let mut segments = grid_lines();
        segments[1] = seg(101.0, 680.0, 299.0, 680.0);
        let tables = detect(&segments);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells.len(), 4);
    }

    #[test]
    fn test_single_box_is_not_a_table() {
        assert!(detect(&rect(100.0, 100.0, 200.0, 50.0)).is_empty());
    }

    #[test]
    fn test_diagonal_and_short_segments_ignored() {
        let segments = vec![seg(0.0, 0.0, 100.0, 100.0), seg(10.0, 10.0, 11.0, 10.0)];
        assert!(detect(&segments).is_empty());
    }

    #[test]
    fn test_underline_is_not_a_table() {
        assert!(detect(&[seg(72.0, 500.0, 300.0, 500.0)]).is_empty());
    }

    #[test]
    fn test_tables_sorted_top_to_bottom() {
        let mut segments: Vec<Segment> = Vec::new();
        // Lower table first in paint order.
        for (x, y) in [(100.0, 200.0), (200.0, 200.0)] {
            segments.extend(rect(x, y, 100.0, 20.0));
        }
        segments.extend(grid_lines());
        let tables = detect(&segments);
        assert_eq!(tables.len(), 2);
        assert!(tables[0].bbox.top < tables[1].bbox.top);
        assert_eq!(tables[1].cells.len(), 2);
    }

    #[test]
    fn test_extract_grid_fills_cells() {
        let cells = detect(&grid_lines()).remove(0).cells;
        let words = vec![
            word("Key", 105.0, 96.0),
            word("Value", 205.0, 96.0),
            word("a", 105.0, 116.0),
            word("multi", 205.0, 113.0),
            word("word", 240.0, 114.0),
            word("outside", 400.0, 116.0),
        ];
        let grid = extract_grid(&cells, &words, &LatticeConfig::default());
        assert_eq!(
            grid,
            vec![
                vec![
                    Some(CellValue::Text("Key".to_string())),
                    Some(CellValue::Text("Value".to_string())),
                ],
                vec![
                    Some(CellValue::Text("a".to_string())),
                    Some(CellValue::Text("multi word".to_string())),
                ],
            ]
        );
    }

    #[test]
    fn test_extract_grid_missing_and_blank_cells() {
        let cells = vec![
            BBox::new(0.0, 0.0, 100.0, 20.0),
            BBox::new(100.0, 0.0, 200.0, 20.0),
            BBox::new(0.0, 20.0, 200.0, 40.0),
        ];
        let grid = extract_grid(&cells, &[], &LatticeConfig::default());
        assert_eq!(
            grid,
            vec![
                vec![
                    Some(CellValue::Text(String::new())),
                    Some(CellValue::Text(String::new())),
                ],
                vec![Some(CellValue::Text(String::new())), None],
            ]
        );
    }

    #[test]
    fn test_cell_text_multiple_lines() {
        let cell = BBox::new(0.0, 0.0, 200.0, 60.0);
        let words = vec![word("first", 5.0, 5.0), word("second", 5.0, 30.0)];
        assert_eq!(
            cell_text(&cell, &words, &LatticeConfig::default()),
            "first\nsecond"
        );
    }
}
