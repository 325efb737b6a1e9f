use std::path::{Path, PathBuf};

use log::info;
use pdf::PdfDocument;
use pdf2md_core::{ConvertError, ConvertOptions, DocumentSource, ProgressObserver};

use crate::output::{write_conversion, Written};
use crate::prelude::{eprintln, println, *};
use crate::progress::ProgressReporter;

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum PageDemarcation {
    /// Concatenate pages directly
    #[default]
    None,
    /// Separate pages with a horizontal rule and a "Page N of T" banner
    Rule,
    /// Write one Markdown file per page
    Split,
}

impl From<PageDemarcation> for pdf2md_core::PageDemarcation {
    fn from(d: PageDemarcation) -> Self {
        match d {
            PageDemarcation::None => pdf2md_core::PageDemarcation::None,
            PageDemarcation::Rule => pdf2md_core::PageDemarcation::Rule,
            PageDemarcation::Split => pdf2md_core::PageDemarcation::Split,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum TableExport {
    /// Only render tables inline
    #[default]
    None,
    /// Also write each table as CSV
    Csv,
    /// Also write each table as JSON records keyed by the header row
    Json,
}

impl From<TableExport> for pdf2md_core::TableExportFormat {
    fn from(t: TableExport) -> Self {
        match t {
            TableExport::None => pdf2md_core::TableExportFormat::None,
            TableExport::Csv => pdf2md_core::TableExportFormat::Csv,
            TableExport::Json => pdf2md_core::TableExportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConvertArgs {
    /// Directory for the Markdown and its side artifacts (defaults to the
    /// input file's directory)
    #[clap(short, long, env = "PDF2MD_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not export or reference images
    #[clap(short, long, env = "PDF2MD_NO_IMAGES", default_value = "false")]
    pub no_images: bool,

    /// How page boundaries appear in the output
    #[clap(
        short,
        long,
        value_enum,
        env = "PDF2MD_PAGE_DEMARCATION",
        default_value = "none"
    )]
    pub page_demarcation: PageDemarcation,

    /// Strip heading markers that already appear in the extracted text
    #[clap(long, env = "PDF2MD_REMOVE_HEADERS", default_value = "false")]
    pub remove_headers: bool,

    /// Line emitted above each table
    #[clap(long, env = "PDF2MD_TABLE_HEADER", default_value = "###")]
    pub table_header: String,

    /// Leave out tables whose cells are all blank
    #[clap(long, env = "PDF2MD_SKIP_EMPTY_TABLES", default_value = "false")]
    pub skip_empty_tables: bool,

    /// Keep the table header line for skipped empty tables
    #[clap(long, env = "PDF2MD_KEEP_EMPTY_TABLE_HEADER", default_value = "false")]
    pub keep_empty_table_header: bool,

    /// Also export every table to a side file
    #[clap(long, value_enum, env = "PDF2MD_TABLE_EXPORT", default_value = "none")]
    pub table_export: TableExport,
}

impl ConvertArgs {
    pub fn to_options(&self) -> ConvertOptions {
        ConvertOptions {
            remove_headers: self.remove_headers,
            table_header: self.table_header.clone(),
            skip_empty_tables: self.skip_empty_tables,
            keep_empty_table_header: self.keep_empty_table_header,
            extract_images: !self.no_images,
            page_demarcation: self.page_demarcation.into(),
            table_export: self.table_export.into(),
            output_dir: self.output_dir.clone(),
        }
    }
}

/// Where artifacts for `input` go when no output directory was given.
fn output_dir_for(input: &Path, options: &ConvertOptions) -> PathBuf {
    if let Some(dir) = &options.output_dir {
        return dir.clone();
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn convert_file(input: &Path, options: &ConvertOptions, show_progress: bool) -> Result<Written> {
    let document = PdfDocument::open(input)
        .map_err(ConvertError::from)
        .wrap_err_with(|| f!("Failed to open {}", input.display()))?;

    let mut reporter = if show_progress {
        ProgressReporter::new(document.name())
    } else {
        ProgressReporter::hidden()
    };
    let result = pdf2md_core::convert(
        &document,
        options,
        Some(&mut reporter as &mut dyn ProgressObserver),
    );
    reporter.finish();
    let conversion = result.wrap_err_with(|| f!("Failed to convert {}", input.display()))?;

    let written = write_conversion(&conversion, document.name(), &output_dir_for(input, options))?;
    info!(
        "{}: {} document(s), {} image(s), {} table export(s)",
        input.display(),
        written.documents.len(),
        written.media,
        written.tables
    );
    Ok(written)
}

/// Convert every input in turn. A failed input is reported and skipped.
pub fn run(inputs: &[PathBuf], args: &ConvertArgs, show_progress: bool) -> Result<()> {
    let options = args.to_options();
    let mut failures = 0;

    for input in inputs {
        match convert_file(input, &options, show_progress) {
            Ok(written) => {
                for path in &written.documents {
                    println!("{} -> {}", input.display(), path.display());
                }
            }
            Err(err) => {
                failures += 1;
                eprintln!("Error: {:#}", err);
            }
        }
    }

    if failures > 0 {
        return Err(eyre!("{} of {} file(s) failed to convert", failures, inputs.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, clap::Parser)]
    struct TestApp {
        #[clap(flatten)]
        args: ConvertArgs,
    }

    fn parse(argv: &[&str]) -> ConvertOptions {
        let mut full = vec!["pdf2md"];
        full.extend_from_slice(argv);
        TestApp::parse_from(full).args.to_options()
    }

    #[test]
    fn test_defaults_match_core_defaults() {
        let options = parse(&[]);
        assert_eq!(options, ConvertOptions::default());
    }

    #[test]
    fn test_flags_map_onto_options() {
        let options = parse(&[
            "-n",
            "-p",
            "split",
            "--remove-headers",
            "--table-header",
            "## Table",
            "--skip-empty-tables",
            "--keep-empty-table-header",
            "--table-export",
            "json",
            "-o",
            "out",
        ]);
        assert!(!options.extract_images);
        assert_eq!(options.page_demarcation, pdf2md_core::PageDemarcation::Split);
        assert!(options.remove_headers);
        assert_eq!(options.table_header, "## Table");
        assert!(options.skip_empty_tables);
        assert!(options.keep_empty_table_header);
        assert_eq!(options.table_export, pdf2md_core::TableExportFormat::Json);
        assert_eq!(options.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_output_dir_defaults_to_input_directory() {
        let options = ConvertOptions::default();
        assert_eq!(
            output_dir_for(Path::new("docs/report.pdf"), &options),
            PathBuf::from("docs")
        );
        assert_eq!(
            output_dir_for(Path::new("report.pdf"), &options),
            PathBuf::from(".")
        );
    }

    #[test]
    fn test_missing_input_is_reported_not_fatal_to_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![dir.path().join("a.pdf"), dir.path().join("b.pdf")];
        let args = TestApp::parse_from(["pdf2md"]).args;
        let err = run(&inputs, &args, false).unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 file(s) failed to convert");
    }
}
