//! Document-wide font-size statistics.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::ConvertError;
use crate::pipeline::{page_words, valid_tables};
use crate::progress::ProgressTracker;
use crate::source::{DocumentSource, PageSource};
use crate::types::{FontSize, Word};

/// One word's contribution to the histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontObservation {
    pub size: FontSize,
    pub char_count: usize,
}

impl From<&Word> for FontObservation {
    fn from(word: &Word) -> Self {
        Self {
            size: word.rounded_size(),
            char_count: word.text.chars().count(),
        }
    }
}

/// Character counts per rounded font size, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeHistogram {
    counts: IndexMap<FontSize, usize>,
    sizes: Vec<FontSize>,
}

impl SizeHistogram {
    pub fn from_observations(observations: impl IntoIterator<Item = FontObservation>) -> Self {
        let mut histogram = SizeHistogram::default();
        for observation in observations {
            histogram.record(observation);
        }
        histogram
    }

    fn record(&mut self, observation: FontObservation) {
        *self.counts.entry(observation.size).or_insert(0) += observation.char_count;
        self.sizes.push(observation.size);
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Every observed size, one entry per word.
    pub fn sizes(&self) -> &[FontSize] {
        &self.sizes
    }

    /// `(size, char_count)` pairs in first-seen order.
    pub fn counts(&self) -> impl Iterator<Item = (FontSize, usize)> + '_ {
        self.counts.iter().map(|(size, count)| (*size, *count))
    }

    pub fn char_count(&self, size: FontSize) -> usize {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// Distinct sizes, largest first.
    pub fn distinct_sizes(&self) -> Vec<FontSize> {
        let mut distinct: Vec<FontSize> = self.counts.keys().copied().collect();
        distinct.sort_unstable_by(|a, b| b.cmp(a));
        distinct
    }

    /// The size with the most characters. Ties go to the size seen first.
    pub fn most_common(&self) -> Option<FontSize> {
        let mut best: Option<(FontSize, usize)> = None;
        for (size, count) in self.counts() {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((size, count));
            }
        }
        best.map(|(size, _)| size)
    }
}

/// Walk every page once and build the histogram from the words that lie
/// outside valid tables.
pub(crate) fn collect_font_statistics<D: DocumentSource>(
    doc: &D,
    progress: &mut ProgressTracker<'_>,
) -> Result<SizeHistogram, ConvertError> {
    let mut histogram = SizeHistogram::default();

    for index in 0..doc.page_count() {
        progress.analyzing(index)?;

        let page = match doc.page(index) {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping page {} during font analysis: {}", index + 1, e);
                continue;
            }
        };

        let tables = valid_tables(&page);
        let words = page_words(&page, &tables);
        debug!(
            "Page {}: {} words outside {} tables",
            page.number(),
            words.len(),
            tables.len()
        );
        for word in &words {
            histogram.record(FontObservation::from(word));
        }
    }

    Ok(histogram)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(size: f64, char_count: usize) -> FontObservation {
        FontObservation {
            size: FontSize::from_points(size),
            char_count,
        }
    }

    #[test]
    fn test_histogram_counts_characters() {
        let h = SizeHistogram::from_observations(vec![obs(10.0, 5), obs(12.0, 3), obs(10.0, 7)]);
        assert_eq!(h.char_count(FontSize::from_points(10.0)), 12);
        assert_eq!(h.char_count(FontSize::from_points(12.0)), 3);
        assert_eq!(h.sizes().len(), 3);
    }

    #[test]
    fn test_histogram_merges_rounded_sizes() {
        let h = SizeHistogram::from_observations(vec![obs(9.98, 2), obs(10.02, 3)]);
        assert_eq!(h.char_count(FontSize::from_points(10.0)), 5);
        assert_eq!(h.distinct_sizes().len(), 1);
    }

    #[test]
    fn test_most_common_by_characters_not_words() {
        // Many short words at 18pt, fewer but longer words at 10pt.
        let mut observations = vec![obs(18.0, 1); 10];
        observations.extend(vec![obs(10.0, 20); 2]);
        let h = SizeHistogram::from_observations(observations);
        assert_eq!(h.most_common(), Some(FontSize::from_points(10.0)));
    }

    #[test]
    fn test_most_common_tie_prefers_first_seen() {
        let h = SizeHistogram::from_observations(vec![obs(12.0, 4), obs(10.0, 4)]);
        assert_eq!(h.most_common(), Some(FontSize::from_points(12.0)));
    }

    #[test]
    fn test_distinct_sizes_descending() {
        let h = SizeHistogram::from_observations(vec![obs(10.0, 1), obs(24.0, 1), obs(14.0, 1)]);
        let sizes: Vec<f64> = h.distinct_sizes().iter().map(|s| s.as_points()).collect();
        assert_eq!(sizes, vec![24.0, 14.0, 10.0]);
    }

    #[test]
    fn test_empty_histogram() {
        let h = SizeHistogram::default();
        assert!(h.is_empty());
        assert_eq!(h.most_common(), None);
    }

    #[test]
    fn test_observation_from_word_counts_chars() {
        let word = Word {
            text: "caf\u{00E9}".to_string(),
            x0: 0.0,
            x1: 10.0,
            top: 0.0,
            bottom: 10.0,
            size: 11.04,
            font_name: "Helvetica".to_string(),
        };
        let o = FontObservation::from(&word);
        assert_eq!(o.char_count, 4);
        assert_eq!(o.size, FontSize::from_points(11.0));
    }
}
