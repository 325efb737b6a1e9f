use indicatif::{ProgressBar, ProgressStyle};
use pdf2md_core::{ObserverError, ProgressObserver, ProgressSnapshot};

/// Drives an `indicatif` bar from conversion progress snapshots.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());
        Self { bar }
    }

    /// A reporter that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for ProgressReporter {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> Result<(), ObserverError> {
        self.bar.set_position(snapshot.percentage.round() as u64);
        self.bar.set_message(snapshot.message.clone());
        Ok(())
    }
}
