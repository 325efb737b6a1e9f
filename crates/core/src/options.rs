use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How page boundaries show up in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDemarcation {
    /// Pages are concatenated directly.
    #[default]
    None,
    /// A horizontal rule and a `Page N of T` banner before every page but the first.
    Rule,
    /// Every page becomes its own document.
    Split,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableExportFormat {
    #[default]
    None,
    Csv,
    Json,
}

impl TableExportFormat {
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            TableExportFormat::None => None,
            TableExportFormat::Csv => Some("csv"),
            TableExportFormat::Json => Some("json"),
        }
    }
}

impl fmt::Display for TableExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableExportFormat::None => write!(f, "none"),
            TableExportFormat::Csv => write!(f, "csv"),
            TableExportFormat::Json => write!(f, "json"),
        }
    }
}

/// Options recognized by [`crate::convert`].
///
/// The progress observer is passed to `convert` separately since it is not
/// plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Strip heading markers that already appear in the extracted text.
    pub remove_headers: bool,
    /// Line emitted above tables whose first cell is non-blank.
    pub table_header: String,
    pub skip_empty_tables: bool,
    /// When skipping an empty table, still emit its header line.
    pub keep_empty_table_header: bool,
    pub extract_images: bool,
    pub page_demarcation: PageDemarcation,
    pub table_export: TableExportFormat,
    /// Where the shell writes artifacts. Unused by the core itself.
    pub output_dir: Option<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            remove_headers: false,
            table_header: "###".to_string(),
            skip_empty_tables: false,
            keep_empty_table_header: false,
            extract_images: true,
            page_demarcation: PageDemarcation::None,
            table_export: TableExportFormat::None,
            output_dir: None,
        }
    }
}
