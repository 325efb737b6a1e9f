use thiserror::Error;

use crate::progress::ObserverError;
use crate::types::BBox;

/// Whole-document failures. Anything scoped to a single page, table or
/// image is logged and skipped instead of surfacing here.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Source document is unreadable: {0}")]
    SourceUnreadable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No extractable text found in the document")]
    NoExtractableText,

    /// An error raised by the progress observer, passed through untouched.
    #[error(transparent)]
    Observer(ObserverError),
}

/// Failures reported by the extraction collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Page {page} could not be read: {message}")]
    Page { page: usize, message: String },

    #[error("Table extraction failed: {0}")]
    Table(String),

    #[error("Image export failed: {0}")]
    Image(String),
}

/// A table region that cannot be subtracted from its page.
#[derive(Debug, Error)]
#[error("Invalid region ({:.1}, {:.1}, {:.1}, {:.1}): {reason}", region.x0, region.top, region.x1, region.bottom)]
pub struct GeometryError {
    pub region: BBox,
    pub reason: String,
}
