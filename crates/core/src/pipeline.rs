//! The two-pass conversion pipeline.
//!
//! Pass one walks every page to build the font-size histogram and the
//! [`HeadingMap`]. Pass two assembles, interleaves and emits each page.
//! Nothing is written to disk here: the caller receives a [`Conversion`]
//! and decides where its artifacts go.

use log::{debug, info, warn};
use serde::Serialize;

use crate::emit::{Emitter, TableExport};
use crate::error::ConvertError;
use crate::fonts::collect_font_statistics;
use crate::headings::{classify, HeadingMap};
use crate::interleave::interleave;
use crate::lines::assemble_lines;
use crate::options::ConvertOptions;
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::source::{DocumentSource, PageSource, TableRegion};
use crate::tables::is_valid_table;
use crate::types::{BBox, ContentUnit, ImageUnit, TableUnit, Word};

/// An exported image, addressed relative to the Markdown output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFile {
    pub page: usize,
    /// e.g. `report_media/page2_Im0.png`
    pub path: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Result of converting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// The whole document, or only the first page in split mode.
    pub markdown: String,
    /// Every page's Markdown in split mode, empty otherwise.
    pub pages: Vec<String>,
    pub tables: Vec<TableExport>,
    pub media: Vec<MediaFile>,
    pub headings: HeadingMap,
}

/// Convert a document to Markdown.
pub fn convert<D: DocumentSource>(
    doc: &D,
    options: &ConvertOptions,
    observer: Option<&mut dyn ProgressObserver>,
) -> Result<Conversion, ConvertError> {
    let total_pages = doc.page_count();
    let mut progress = ProgressTracker::new(observer, total_pages);
    progress.start()?;

    let histogram = collect_font_statistics(doc, &mut progress)?;
    if histogram.is_empty() {
        return Err(ConvertError::NoExtractableText);
    }
    progress.analysis_complete()?;

    let headings = classify(&histogram);
    info!(
        "{}: body size {}, {} heading level(s)",
        doc.name(),
        headings.body_size(),
        headings.len()
    );
    for (size, level) in headings.iter() {
        debug!("Font size {} -> level {}", size, level.as_u8());
    }

    let mut emitter = Emitter::new(options, total_pages);
    let mut media: Vec<MediaFile> = Vec::new();

    for index in 0..total_pages {
        let number = index + 1;
        progress.converting(number)?;
        emitter.begin_page(number);

        let page = match doc.page(index) {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping page {}: {}", number, e);
                continue;
            }
        };

        for unit in page_content(&page, doc.name(), &headings, options, &mut media) {
            emitter.push_unit(&unit);
        }
    }

    progress.complete()?;
    let emitted = emitter.finish();

    Ok(Conversion {
        markdown: emitted.markdown,
        pages: emitted.pages,
        tables: emitted.tables,
        media,
        headings,
    })
}

/// Tables that lie entirely within the page. Others are dropped.
pub(crate) fn valid_tables<P: PageSource>(page: &P) -> Vec<TableRegion> {
    let page_box = page.bbox();
    page.tables()
        .into_iter()
        .filter(|table| {
            let valid = is_valid_table(&table.bbox, &page_box);
            if !valid {
                debug!(
                    "Dropping table outside page {} bounds: {:?}",
                    page.number(),
                    table.bbox
                );
            }
            valid
        })
        .collect()
}

/// Words outside the given tables. A table whose region cannot be excluded
/// is skipped and its words are kept.
pub(crate) fn page_words<P: PageSource>(page: &P, tables: &[TableRegion]) -> Vec<Word> {
    let exclusions: Vec<BBox> = tables
        .iter()
        .filter_map(|table| match page.exclusion(&table.bbox) {
            Ok(region) => Some(region),
            Err(e) => {
                warn!("Page {}: {}", page.number(), e);
                None
            }
        })
        .collect();
    page.words(&exclusions)
}

fn page_content<P: PageSource>(
    page: &P,
    stem: &str,
    headings: &HeadingMap,
    options: &ConvertOptions,
    media: &mut Vec<MediaFile>,
) -> Vec<ContentUnit> {
    let number = page.number();
    let regions = valid_tables(page);
    let words = page_words(page, &regions);
    let lines = assemble_lines(&words, headings);

    let tables: Vec<TableUnit> = regions
        .iter()
        .map(|region| TableUnit {
            bbox: region.bbox,
            page: number,
            cell_count: region.cells.len(),
            grid: match page.extract_table(region) {
                Ok(grid) => Some(grid),
                Err(e) => {
                    warn!("Page {}: {}", number, e);
                    None
                }
            },
        })
        .collect();

    let images = if options.extract_images {
        page_images(page, stem, media)
    } else {
        Vec::new()
    };

    debug!(
        "Page {}: {} lines, {} tables, {} images",
        number,
        lines.len(),
        tables.len(),
        images.len()
    );

    interleave(lines, tables, images)
}

fn page_images<P: PageSource>(page: &P, stem: &str, media: &mut Vec<MediaFile>) -> Vec<ImageUnit> {
    let number = page.number();
    let mut units = Vec::new();

    for image in page.images() {
        let exported = match page.export_image(&image) {
            Ok(exported) => exported,
            Err(e) => {
                warn!("Skipping image {} on page {}: {}", image.name, number, e);
                continue;
            }
        };

        let path = format!(
            "{}_media/page{}_{}.{}",
            stem, number, image.name, exported.extension
        );
        if !media.iter().any(|m| m.path == path) {
            media.push(MediaFile {
                page: number,
                path: path.clone(),
                bytes: exported.bytes,
            });
        }

        units.push(ImageUnit {
            path,
            alt_text: image.name,
            top: image.bbox.top,
            page: number,
        });
    }

    units
}
