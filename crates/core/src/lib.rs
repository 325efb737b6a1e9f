//! Core library for pdf2md
//!
//! This crate implements the **Functional Core** of pdf2md: it turns
//! position-only text, table and image primitives into structured Markdown.
//! It never opens files. Documents reach it through the [`DocumentSource`]
//! and [`PageSource`] traits, and results leave it as a [`Conversion`]
//! value that the shell writes to disk.
//!
//! # Pipeline
//!
//! 1. [`fonts`]: collect a character-weighted font-size histogram over every
//!    page, ignoring words inside valid tables.
//! 2. [`headings`]: derive the body size and up to six heading levels.
//! 3. [`lines`]: group each page's words into lines and bold style runs.
//! 4. [`tables`]: validate tables against the page, detect empty ones.
//! 5. [`interleave`]: order lines, tables and images by vertical position.
//! 6. [`emit`]: render Markdown under the chosen page demarcation.
//!
//! [`progress`] reports a two-phase percentage to an optional observer
//! throughout.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use pdf2md_core::{convert, ConvertOptions, PageDemarcation};
//!
//! let options = ConvertOptions {
//!     page_demarcation: PageDemarcation::Rule,
//!     ..ConvertOptions::default()
//! };
//! let conversion = convert(&document, &options, None)?;
//! println!("{}", conversion.markdown);
//! ```

pub mod emit;
pub mod error;
pub mod fonts;
pub mod headings;
pub mod interleave;
pub mod lines;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod tables;
pub mod types;

#[cfg(test)]
mod testing;

pub use emit::{remove_markdown_headers, TableExport};
pub use error::{ConvertError, GeometryError, SourceError};
pub use headings::HeadingMap;
pub use options::{ConvertOptions, PageDemarcation, TableExportFormat};
pub use pipeline::{convert, Conversion, MediaFile};
pub use progress::{ObserverError, Phase, ProgressObserver, ProgressSnapshot};
pub use source::{DocumentSource, ExportedImage, PageImage, PageSource, TableRegion};
pub use types::{BBox, CellValue, TableGrid, Word};
