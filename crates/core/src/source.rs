//! The extraction collaborator contract.
//!
//! The core never reads document bytes. Everything it knows about a
//! document arrives through these two traits, which keeps the pipeline
//! testable against in-memory fixtures.

use crate::error::{GeometryError, SourceError};
use crate::types::{BBox, TableGrid, Word};

/// An opened document. Dropping it releases the underlying resource.
pub trait DocumentSource {
    type Page<'a>: PageSource
    where
        Self: 'a;

    /// Base name used for media and side artifacts (usually the file stem).
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Load the page at the 0-based `index`.
    fn page(&self, index: usize) -> Result<Self::Page<'_>, SourceError>;
}

/// A single page of an opened document.
pub trait PageSource {
    /// 1-based page number.
    fn number(&self) -> usize;

    /// The page bounds in top-left-origin page space.
    fn bbox(&self) -> BBox;

    /// Words in extraction order (top-to-bottom, left-to-right), leaving out
    /// any word that falls inside one of the `excluding` regions.
    fn words(&self, excluding: &[BBox]) -> Vec<Word>;

    /// Validate a region for subtraction from the page.
    fn exclusion(&self, region: &BBox) -> Result<BBox, GeometryError>;

    /// Every table the collaborator detected, valid or not.
    fn tables(&self) -> Vec<TableRegion>;

    fn extract_table(&self, table: &TableRegion) -> Result<TableGrid, SourceError>;

    /// Raster images drawn on the page, including those nested in forms.
    fn images(&self) -> Vec<PageImage>;

    fn export_image(&self, image: &PageImage) -> Result<ExportedImage, SourceError>;
}

/// Geometry of a detected table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
}

/// A raster image placement on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Collaborator-specific handle, opaque to the core.
    pub index: usize,
    /// The image's name inside the document (e.g. the XObject key `Im0`).
    pub name: String,
    pub bbox: BBox,
}

/// Encoded image bytes ready to be written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `png`.
    pub extension: String,
}
