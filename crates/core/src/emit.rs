//! Markdown emission.
//!
//! The [`Emitter`] receives a page's interleaved [`ContentUnit`]s and appends
//! their Markdown to a buffer. Page boundaries are handled according to the
//! configured [`PageDemarcation`]: pages either run together, are separated
//! by a rule banner, or are kept as independent documents.

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::options::{ConvertOptions, PageDemarcation, TableExportFormat};
use crate::tables::{export_table, is_empty_table, render_table};
use crate::types::{ContentUnit, ImageUnit, TableUnit, TextLine};

static LEADING_HEADERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#+\s*)+").expect("leading header pattern is valid"));

/// Strip literal Markdown heading markers from the start of `text`.
///
/// The input is trimmed first. Applying this twice gives the same result as
/// applying it once.
pub fn remove_markdown_headers(text: &str) -> String {
    LEADING_HEADERS.replace(text.trim(), "").into_owned()
}

/// One table's raw grid serialized for a side artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableExport {
    pub page: usize,
    /// 1-based position among the exported tables of its page.
    pub index: usize,
    pub format: TableExportFormat,
    pub content: String,
}

impl TableExport {
    /// File name of the artifact, e.g. `page2_table1.csv`.
    pub fn file_name(&self) -> String {
        let extension = self.format.extension().unwrap_or("txt");
        format!("page{}_table{}.{}", self.page, self.index, extension)
    }
}

/// The emitter's result before media are attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emitted {
    pub markdown: String,
    /// One entry per page in split mode, empty otherwise.
    pub pages: Vec<String>,
    pub tables: Vec<TableExport>,
}

pub struct Emitter<'a> {
    options: &'a ConvertOptions,
    total_pages: usize,
    buffer: String,
    pages: Vec<String>,
    current_page: Option<usize>,
    table_index: usize,
    tables: Vec<TableExport>,
}

impl<'a> Emitter<'a> {
    pub fn new(options: &'a ConvertOptions, total_pages: usize) -> Self {
        Self {
            options,
            total_pages,
            buffer: String::new(),
            pages: Vec::new(),
            current_page: None,
            table_index: 0,
            tables: Vec::new(),
        }
    }

    /// Start page `number` (1-based).
    pub fn begin_page(&mut self, number: usize) {
        match self.options.page_demarcation {
            PageDemarcation::None => {}
            PageDemarcation::Rule => {
                if number > 1 {
                    self.buffer
                        .push_str(&format!("\n---\n\nPage {} of {}\n\n", number, self.total_pages));
                }
            }
            PageDemarcation::Split => {
                if self.current_page.is_some() {
                    self.pages.push(std::mem::take(&mut self.buffer));
                }
            }
        }
        self.current_page = Some(number);
        self.table_index = 0;
    }

    pub fn push_unit(&mut self, unit: &ContentUnit) {
        match unit {
            ContentUnit::Text(line) => self.push_line(line),
            ContentUnit::Table(table) => self.push_table(table),
            ContentUnit::Image(image) => self.push_image(image),
        }
    }

    fn push_line(&mut self, line: &TextLine) {
        let mut text = line.text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.options.remove_headers {
            text = remove_markdown_headers(&text);
        }

        match line.level.filter(|_| line.is_heading) {
            Some(level) => {
                self.buffer
                    .push_str(&format!("\n{} {}\n\n", level.markers(), text));
            }
            None => {
                self.buffer.push_str(&text);
                self.buffer.push('\n');
            }
        }
    }

    fn push_table(&mut self, table: &TableUnit) {
        let marker = &self.options.table_header;

        if self.options.skip_empty_tables && is_empty_table(table) {
            debug!("Skipping empty table on page {}", table.page);
            if self.options.keep_empty_table_header {
                self.buffer.push_str(marker);
                self.buffer.push_str("\n\n");
            }
            return;
        }

        let Some(grid) = &table.grid else {
            warn!(
                "Skipping table on page {}: cell text could not be extracted",
                table.page
            );
            return;
        };

        self.table_index += 1;
        match export_table(grid, self.options.table_export) {
            Ok(Some(content)) => self.tables.push(TableExport {
                page: table.page,
                index: self.table_index,
                format: self.options.table_export,
                content,
            }),
            Ok(None) => {}
            Err(e) => warn!(
                "Skipping {} export of table {} on page {}: {}",
                self.options.table_export, self.table_index, table.page, e
            ),
        }

        self.buffer.push_str(&render_table(grid, marker));
    }

    fn push_image(&mut self, image: &ImageUnit) {
        self.buffer
            .push_str(&format!("![{}]({})\n\n", image.alt_text, image.path));
    }

    /// Close the last page and return the emitted text.
    ///
    /// In split mode `markdown` holds only the first page's content; every
    /// page is available in `pages`.
    pub fn finish(mut self) -> Emitted {
        if self.options.page_demarcation == PageDemarcation::Split {
            if self.current_page.is_some() {
                self.pages.push(std::mem::take(&mut self.buffer));
            }
            let markdown = self.pages.first().cloned().unwrap_or_default();
            return Emitted {
                markdown,
                pages: self.pages,
                tables: self.tables,
            };
        }

        Emitted {
            markdown: self.buffer,
            pages: Vec::new(),
            tables: self.tables,
        }
    }
}
