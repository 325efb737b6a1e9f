//! Heading-level classification from font-size statistics.
//!
//! The body size is the size carrying the most characters. Sizes above it
//! become heading candidates, and candidates that are too close to the
//! previous kept size collapse into it. "Too close" adapts to the document:
//! it is the mean ratio between adjacent candidate sizes minus their standard
//! deviation, clamped to `[1.02, 1.15]`.

use std::collections::BTreeMap;

use crate::fonts::SizeHistogram;
use crate::types::{FontSize, HeadingLevel};

const MIN_DIFF_RATIO_FLOOR: f64 = 1.02;
const MIN_DIFF_RATIO_CEILING: f64 = 1.15;
const MAX_LEVELS: usize = 6;

/// Rounded font size to heading level, plus the body size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadingMap {
    levels: BTreeMap<FontSize, HeadingLevel>,
    body_size: FontSize,
}

impl HeadingMap {
    pub fn body_size(&self) -> FontSize {
        self.body_size
    }

    /// The heading level for `size`. Body-size text never gets one.
    pub fn level_for(&self, size: FontSize) -> Option<HeadingLevel> {
        if size == self.body_size {
            return None;
        }
        self.levels.get(&size).copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// `(size, level)` pairs, largest size first.
    pub fn iter(&self) -> impl Iterator<Item = (FontSize, HeadingLevel)> + '_ {
        self.levels.iter().rev().map(|(size, level)| (*size, *level))
    }
}

/// Build the [`HeadingMap`] for a document.
pub fn classify(histogram: &SizeHistogram) -> HeadingMap {
    let distinct = histogram.distinct_sizes();
    let Some(&largest) = distinct.first() else {
        return HeadingMap::default();
    };

    if distinct.len() < 2 {
        return HeadingMap {
            levels: BTreeMap::new(),
            body_size: largest,
        };
    }

    let body_size = histogram.most_common().unwrap_or(largest);
    let candidates: Vec<FontSize> = distinct
        .into_iter()
        .filter(|size| *size > body_size)
        .collect();

    let mut map = HeadingMap {
        levels: BTreeMap::new(),
        body_size,
    };
    if candidates.is_empty() {
        return map;
    }

    let (avg_ratio, std_ratio) = size_ratio_stats(&candidates);
    // A single candidate yields no ratio; no heading is detected then.
    if avg_ratio == 0.0 {
        return map;
    }

    let min_diff = (avg_ratio - std_ratio).clamp(MIN_DIFF_RATIO_FLOOR, MIN_DIFF_RATIO_CEILING);
    for (size, level) in select_heading_sizes(&candidates, min_diff)
        .into_iter()
        .zip(1u8..)
    {
        if let Ok(level) = HeadingLevel::try_from(level) {
            map.levels.insert(size, level);
        }
    }

    map
}

/// Mean and population standard deviation of `larger / smaller` for each
/// adjacent pair of the descending `sizes`. `(0, 0)` when there are no pairs.
fn size_ratio_stats(sizes: &[FontSize]) -> (f64, f64) {
    let ratios: Vec<f64> = sizes
        .windows(2)
        .map(|pair| pair[0].as_points() / pair[1].as_points())
        .collect();

    if ratios.is_empty() {
        return (0.0, 0.0);
    }

    let n = ratios.len() as f64;
    let avg = ratios.iter().sum::<f64>() / n;
    let variance = ratios.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
    (avg, variance.sqrt())
}

/// Greedy walk from the largest size down, keeping a size only when it is
/// at least `min_diff` times smaller than the last kept one.
fn select_heading_sizes(candidates: &[FontSize], min_diff: f64) -> Vec<FontSize> {
    let mut kept: Vec<FontSize> = Vec::with_capacity(MAX_LEVELS);
    let Some((&first, rest)) = candidates.split_first() else {
        return kept;
    };
    kept.push(first);

    let mut current = first;
    for &size in rest {
        if kept.len() >= MAX_LEVELS {
            break;
        }
        if current.as_points() / size.as_points() >= min_diff {
            kept.push(size);
            current = size;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontObservation;

    fn histogram(entries: &[(f64, usize)]) -> SizeHistogram {
        SizeHistogram::from_observations(entries.iter().map(|&(size, chars)| FontObservation {
            size: FontSize::from_points(size),
            char_count: chars,
        }))
    }

    fn pt(size: f64) -> FontSize {
        FontSize::from_points(size)
    }

    #[test]
    fn test_single_size_has_no_headings() {
        let map = classify(&histogram(&[(11.0, 100), (11.0, 50)]));
        assert_eq!(map.body_size(), pt(11.0));
        assert!(map.is_empty());
    }

    #[test]
    fn test_empty_histogram() {
        let map = classify(&SizeHistogram::default());
        assert!(map.is_empty());
    }

    #[test]
    fn test_single_larger_size_yields_no_heading() {
        let map = classify(&histogram(&[(10.0, 500), (18.0, 5)]));
        assert_eq!(map.body_size(), pt(10.0));
        assert!(map.is_empty());
        assert_eq!(map.level_for(pt(18.0)), None);
    }

    #[test]
    fn test_two_larger_sizes_get_two_levels() {
        let map = classify(&histogram(&[(10.0, 500), (18.0, 5), (14.0, 20)]));
        assert_eq!(map.level_for(pt(18.0)), Some(HeadingLevel::H1));
        assert_eq!(map.level_for(pt(14.0)).map(|l| l.as_u8()), Some(2));
        assert_eq!(map.level_for(pt(10.0)), None);
    }

    #[test]
    fn test_body_size_is_excluded() {
        let map = classify(&histogram(&[
            (24.0, 10),
            (18.0, 10),
            (12.0, 1000),
            (8.0, 50),
        ]));
        assert_eq!(map.body_size(), pt(12.0));
        assert!(map.iter().all(|(size, _)| size != map.body_size()));
        // Smaller-than-body text is never a heading.
        assert_eq!(map.level_for(pt(8.0)), None);
    }

    #[test]
    fn test_close_sizes_collapse() {
        // Ratios: 20/19.8 ~ 1.01, 19.8/14 ~ 1.41. avg - std clamps to 1.02,
        // so 19.8 is too close to 20 and is skipped.
        let map = classify(&histogram(&[(10.0, 1000), (20.0, 5), (19.8, 5), (14.0, 5)]));
        assert_eq!(map.level_for(pt(20.0)), Some(HeadingLevel::H1));
        assert_eq!(map.level_for(pt(19.8)), None);
        assert_eq!(map.level_for(pt(14.0)).map(|l| l.as_u8()), Some(2));
    }

    #[test]
    fn test_at_most_six_levels_in_decreasing_order() {
        let map = classify(&histogram(&[
            (10.0, 10_000),
            (40.0, 1),
            (34.0, 1),
            (28.0, 1),
            (24.0, 1),
            (20.0, 1),
            (17.0, 1),
            (14.0, 1),
            (12.0, 1),
        ]));
        assert_eq!(map.len(), 6);
        let entries: Vec<(FontSize, HeadingLevel)> = map.iter().collect();
        for pair in entries.windows(2) {
            assert!(pair[0].0 > pair[1].0);
            assert_eq!(pair[0].1.as_u8() + 1, pair[1].1.as_u8());
        }
        assert_eq!(entries[0], (pt(40.0), HeadingLevel::H1));
    }

    #[test]
    fn test_size_ratio_stats() {
        let (avg, std) = size_ratio_stats(&[pt(20.0), pt(10.0), pt(5.0)]);
        assert!((avg - 2.0).abs() < 1e-9);
        assert!(std.abs() < 1e-9);
        assert_eq!(size_ratio_stats(&[pt(20.0)]), (0.0, 0.0));
    }

    #[test]
    fn test_select_heading_sizes_respects_min_diff() {
        let kept = select_heading_sizes(&[pt(20.0), pt(19.0), pt(16.0)], 1.15);
        assert_eq!(kept, vec![pt(20.0), pt(16.0)]);
    }
}
