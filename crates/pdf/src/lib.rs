//! lopdf-backed extraction for pdf2md.
//!
//! [`PdfDocument`] opens a file and implements the core's
//! [`DocumentSource`]; each [`PdfPage`] is walked once when loaded and then
//! answers word, table and image queries from memory.

use std::path::Path;

use log::debug;
use pdf2md_core::{
    BBox, ConvertError, DocumentSource, ExportedImage, GeometryError, PageImage, PageSource,
    SourceError, TableGrid, TableRegion, Word,
};
use thiserror::Error;

use parser::backend::{LopdfBackend, ObjectId, PageId, PdfBackend};
use parser::table::{DetectedTable, LatticeConfig};

pub mod images;
pub mod parser;
pub mod types;

pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Image object {0:?} not found")]
    ImageNotFound(ObjectId),
    #[error("Image export error: {0}")]
    Image(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A document that cannot be opened is unreadable as a whole.
impl From<PdfError> for ConvertError {
    fn from(e: PdfError) -> Self {
        ConvertError::SourceUnreadable(Box::new(e))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An opened PDF.
pub struct PdfDocument {
    backend: LopdfBackend,
    name: String,
    pages: Vec<PageId>,
    lattice: LatticeConfig,
}

impl PdfDocument {
    /// Open a PDF file. The file stem becomes the document name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(name, &bytes)
    }

    /// Parse an in-memory PDF.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, PdfError> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        let pages = backend.pages().into_values().collect();
        Ok(Self {
            backend,
            name: name.into(),
            pages,
            lattice: LatticeConfig::default(),
        })
    }

    /// Walk one page: words, ruled tables and image placements.
    fn load_page(&self, number: usize, page_id: PageId) -> Result<PdfPage<'_>, PdfError> {
        let media_box = self.backend.media_box(page_id)?;
        let layout = parser::layout::extract_page_layout(&self.backend, page_id)?;

        let [llx, lly, urx, ury] = media_box.map(f64::from);
        let bbox = BBox::new(0.0, 0.0, urx - llx, ury - lly);

        let words = parser::words::build_words(&layout.glyphs, media_box);
        let tables = parser::table::detect_tables(&layout.segments, media_box, &self.lattice);

        let mut images: Vec<(PageImage, ObjectId)> = Vec::new();
        for placement in layout.images {
            // The same key may name different objects in nested forms.
            let clash = images
                .iter()
                .any(|(image, id)| image.name == placement.name && *id != placement.id);
            let name = if clash {
                format!("{}_{}", placement.name, placement.id.0)
            } else {
                placement.name
            };
            let [x0, y0, x1, y1] = placement.bbox.map(f64::from);
            let image = PageImage {
                index: images.len(),
                name,
                bbox: BBox::new(x0 - llx, ury - y1, x1 - llx, ury - y0),
            };
            images.push((image, placement.id));
        }

        debug!(
            "Page {}: {} words, {} tables, {} images",
            number,
            words.len(),
            tables.len(),
            images.len()
        );

        Ok(PdfPage {
            backend: &self.backend,
            lattice: &self.lattice,
            number,
            bbox,
            words,
            tables,
            images,
        })
    }
}

impl DocumentSource for PdfDocument {
    type Page<'a> = PdfPage<'a>;

    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, SourceError> {
        let number = index + 1;
        let page_id = *self.pages.get(index).ok_or_else(|| SourceError::Page {
            page: number,
            message: "page index out of range".to_string(),
        })?;

        self.load_page(number, page_id)
            .map_err(|e| SourceError::Page {
                page: number,
                message: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A walked page.
pub struct PdfPage<'a> {
    backend: &'a LopdfBackend,
    lattice: &'a LatticeConfig,
    number: usize,
    bbox: BBox,
    words: Vec<Word>,
    tables: Vec<DetectedTable>,
    images: Vec<(PageImage, ObjectId)>,
}

impl PageSource for PdfPage<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn bbox(&self) -> BBox {
        self.bbox
    }

    fn words(&self, excluding: &[BBox]) -> Vec<Word> {
        self.words
            .iter()
            .filter(|word| {
                let (x, y) = word.center();
                !excluding.iter().any(|region| region.contains_point(x, y))
            })
            .cloned()
            .collect()
    }

    fn exclusion(&self, region: &BBox) -> Result<BBox, GeometryError> {
        let invalid = |reason: &str| GeometryError {
            region: *region,
            reason: reason.to_string(),
        };

        let finite = [region.x0, region.top, region.x1, region.bottom]
            .iter()
            .all(|v| v.is_finite());
        if !finite || region.width() <= 0.0 || region.height() <= 0.0 {
            return Err(invalid("degenerate region"));
        }

        let clipped = BBox::new(
            region.x0.max(self.bbox.x0),
            region.top.max(self.bbox.top),
            region.x1.min(self.bbox.x1),
            region.bottom.min(self.bbox.bottom),
        );
        if clipped.width() <= 0.0 || clipped.height() <= 0.0 {
            return Err(invalid("region lies outside the page"));
        }
        Ok(clipped)
    }

    fn tables(&self) -> Vec<TableRegion> {
        self.tables
            .iter()
            .map(|table| TableRegion {
                bbox: table.bbox,
                cells: table.cells.clone(),
            })
            .collect()
    }

    fn extract_table(&self, table: &TableRegion) -> Result<TableGrid, SourceError> {
        if table.cells.is_empty() {
            return Err(SourceError::Table("table has no cells".to_string()));
        }
        Ok(parser::table::extract_grid(
            &table.cells,
            &self.words,
            self.lattice,
        ))
    }

    fn images(&self) -> Vec<PageImage> {
        self.images.iter().map(|(image, _)| image.clone()).collect()
    }

    fn export_image(&self, image: &PageImage) -> Result<ExportedImage, SourceError> {
        let (_, id) = self
            .images
            .get(image.index)
            .ok_or_else(|| SourceError::Image(format!("unknown image {}", image.name)))?;

        let data =
            images::export_image(self.backend, *id).map_err(|e| SourceError::Image(e.to_string()))?;
        let extension = data
            .format
            .extension()
            .ok_or_else(|| SourceError::Image(format!("unrecognized format for {}", image.name)))?;

        Ok(ExportedImage {
            bytes: data.bytes,
            extension: extension.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
