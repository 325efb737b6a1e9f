//! Two-phase progress accounting.
//!
//! Font analysis reports percentages in `[0, 70]`, conversion in `[70, 100]`.
//! The observer runs synchronously on the caller's thread; an error it
//! returns aborts the run.

use std::fmt;

use serde::Serialize;

use crate::error::ConvertError;

/// Share of the run attributed to the font analysis pass.
const ANALYSIS_SHARE: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Analysis,
    Conversion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Analysis => write!(f, "analysis"),
            Phase::Conversion => write!(f, "conversion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub current_page: usize,
    pub total_pages: usize,
    pub percentage: f64,
    pub message: String,
}

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives a snapshot at every progress point of a conversion.
pub trait ProgressObserver {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> Result<(), ObserverError>;
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressSnapshot) -> Result<(), ObserverError>,
{
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> Result<(), ObserverError> {
        self(snapshot)
    }
}

/// Drives the observer through the fixed sequence of progress points.
pub(crate) struct ProgressTracker<'a> {
    observer: Option<&'a mut dyn ProgressObserver>,
    total_pages: usize,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(observer: Option<&'a mut dyn ProgressObserver>, total_pages: usize) -> Self {
        Self {
            observer,
            total_pages,
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), ConvertError> {
        self.report(Phase::Analysis, 0, 0.0, "Starting conversion...".to_string())
    }

    /// Report the font analysis of the page at the 0-based `index`.
    pub(crate) fn analyzing(&mut self, index: usize) -> Result<(), ConvertError> {
        let percentage = self.fraction(index) * ANALYSIS_SHARE;
        let message = format!("Analyzing fonts: page {}/{}", index + 1, self.total_pages);
        self.report(Phase::Analysis, index + 1, percentage, message)
    }

    pub(crate) fn analysis_complete(&mut self) -> Result<(), ConvertError> {
        self.report(
            Phase::Analysis,
            self.total_pages,
            ANALYSIS_SHARE,
            "Font analysis complete, starting content extraction...".to_string(),
        )
    }

    /// Report the conversion of the 1-based page `number`.
    pub(crate) fn converting(&mut self, number: usize) -> Result<(), ConvertError> {
        let percentage = ANALYSIS_SHARE + self.fraction(number) * (100.0 - ANALYSIS_SHARE);
        let message = format!("Converting page {}/{}", number, self.total_pages);
        self.report(Phase::Conversion, number, percentage, message)
    }

    pub(crate) fn complete(&mut self) -> Result<(), ConvertError> {
        self.report(
            Phase::Conversion,
            self.total_pages,
            100.0,
            "Conversion complete!".to_string(),
        )
    }

    fn fraction(&self, pages: usize) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        pages as f64 / self.total_pages as f64
    }

    fn report(
        &mut self,
        phase: Phase,
        current_page: usize,
        percentage: f64,
        message: String,
    ) -> Result<(), ConvertError> {
        let Some(observer) = self.observer.as_mut() else {
            return Ok(());
        };
        let snapshot = ProgressSnapshot {
            phase,
            current_page,
            total_pages: self.total_pages,
            percentage,
            message,
        };
        observer
            .on_progress(&snapshot)
            .map_err(ConvertError::Observer)
    }
}
