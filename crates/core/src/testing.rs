//! In-memory document collaborator for pipeline tests.

use crate::error::{GeometryError, SourceError};
use crate::source::{DocumentSource, ExportedImage, PageImage, PageSource, TableRegion};
use crate::types::{BBox, TableGrid, Word};

pub const LETTER: BBox = BBox {
    x0: 0.0,
    top: 0.0,
    x1: 612.0,
    bottom: 792.0,
};

pub fn word(text: &str, x0: f64, top: f64, size: f64) -> Word {
    Word {
        text: text.to_string(),
        x0,
        x1: x0 + 6.0 * text.chars().count() as f64,
        top,
        bottom: top + size,
        size,
        font_name: "Helvetica".to_string(),
    }
}

/// Words for a line of text starting at the left margin.
pub fn line_words(text: &str, top: f64, size: f64) -> Vec<Word> {
    let mut x = 72.0;
    text.split_whitespace()
        .map(|t| {
            let w = word(t, x, top, size);
            x = w.x1 + 4.0;
            w
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MockTable {
    pub region: TableRegion,
    /// `None` makes extraction fail.
    pub grid: Option<TableGrid>,
}

#[derive(Debug, Clone)]
pub struct MockImage {
    pub image: PageImage,
    /// `None` makes export fail.
    pub export: Option<ExportedImage>,
}

#[derive(Debug, Clone)]
pub struct MockPage {
    pub number: usize,
    pub bbox: BBox,
    pub words: Vec<Word>,
    pub tables: Vec<MockTable>,
    pub images: Vec<MockImage>,
    /// Regions whose exclusion fails with a geometry error.
    pub bad_regions: Vec<BBox>,
}

impl MockPage {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            bbox: LETTER,
            words: Vec::new(),
            tables: Vec::new(),
            images: Vec::new(),
            bad_regions: Vec::new(),
        }
    }

    pub fn line(mut self, text: &str, top: f64, size: f64) -> Self {
        self.words.extend(line_words(text, top, size));
        self
    }

    pub fn table(mut self, bbox: BBox, grid: Option<TableGrid>) -> Self {
        let cells = match &grid {
            Some(rows) => rows.iter().flatten().map(|_| bbox).collect(),
            None => vec![bbox],
        };
        self.tables.push(MockTable {
            region: TableRegion { bbox, cells },
            grid,
        });
        self
    }

    pub fn image(mut self, name: &str, top: f64, export: Option<ExportedImage>) -> Self {
        let index = self.images.len();
        self.images.push(MockImage {
            image: PageImage {
                index,
                name: name.to_string(),
                bbox: BBox::new(72.0, top, 272.0, top + 100.0),
            },
            export,
        });
        self
    }
}

impl PageSource for MockPage {
    fn number(&self) -> usize {
        self.number
    }

    fn bbox(&self) -> BBox {
        self.bbox
    }

    fn words(&self, excluding: &[BBox]) -> Vec<Word> {
        self.words
            .iter()
            .filter(|w| {
                let (x, y) = w.center();
                !excluding.iter().any(|region| region.contains_point(x, y))
            })
            .cloned()
            .collect()
    }

    fn exclusion(&self, region: &BBox) -> Result<BBox, GeometryError> {
        if self.bad_regions.contains(region) {
            return Err(GeometryError {
                region: *region,
                reason: "rejected by mock".to_string(),
            });
        }
        Ok(*region)
    }

    fn tables(&self) -> Vec<TableRegion> {
        self.tables.iter().map(|t| t.region.clone()).collect()
    }

    fn extract_table(&self, table: &TableRegion) -> Result<TableGrid, SourceError> {
        self.tables
            .iter()
            .find(|t| &t.region == table)
            .and_then(|t| t.grid.clone())
            .ok_or_else(|| SourceError::Table("mock extraction failure".to_string()))
    }

    fn images(&self) -> Vec<PageImage> {
        self.images.iter().map(|i| i.image.clone()).collect()
    }

    fn export_image(&self, image: &PageImage) -> Result<ExportedImage, SourceError> {
        self.images
            .iter()
            .find(|i| &i.image == image)
            .and_then(|i| i.export.clone())
            .ok_or_else(|| SourceError::Image(format!("cannot decode {}", image.name)))
    }
}

#[derive(Debug, Clone)]
pub struct MockDocument {
    pub name: String,
    /// `None` entries fail to load.
    pub pages: Vec<Option<MockPage>>,
}

impl MockDocument {
    pub fn new(name: &str, pages: Vec<MockPage>) -> Self {
        Self {
            name: name.to_string(),
            pages: pages.into_iter().map(Some).collect(),
        }
    }
}

impl DocumentSource for MockDocument {
    type Page<'a> = MockPage;

    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<MockPage, SourceError> {
        self.pages
            .get(index)
            .cloned()
            .flatten()
            .ok_or_else(|| SourceError::Page {
                page: index + 1,
                message: "mock page unavailable".to_string(),
            })
    }
}
