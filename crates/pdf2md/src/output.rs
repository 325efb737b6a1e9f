//! Writes a [`Conversion`] to disk.
//!
//! Layout under the output directory:
//!
//! ```text
//! <stem>.md                          single document
//! <stem>_page<N>.md                  split mode, one per page
//! <stem>_media/page<N>_<name>.<ext>  exported images
//! <stem>_tables/page<N>_table<K>.<ext>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use pdf2md_core::Conversion;

use crate::error::Error;

/// What was written for one input.
#[derive(Debug, Default)]
pub struct Written {
    pub documents: Vec<PathBuf>,
    pub media: usize,
    pub tables: usize,
}

fn create_dir(path: &Path) -> Result<(), Error> {
    if path.exists() && !path.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    fs::create_dir_all(path).map_err(|source| Error::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: PathBuf, contents: impl AsRef<[u8]>) -> Result<PathBuf, Error> {
    match fs::write(&path, contents) {
        Ok(()) => Ok(path),
        Err(source) => Err(Error::Write { path, source }),
    }
}

/// Write every artifact of `conversion`. On error nothing written by this
/// call is left behind.
pub fn write_conversion(
    conversion: &Conversion,
    stem: &str,
    dir: &Path,
) -> Result<Written, Error> {
    create_dir(dir)?;
    let mut files = Vec::new();

    match write_artifacts(conversion, stem, dir, &mut files) {
        Ok(written) => Ok(written),
        Err(e) => {
            for path in &files {
                if let Err(err) = fs::remove_file(path) {
                    warn!("Could not remove {}: {}", path.display(), err);
                }
            }
            Err(e)
        }
    }
}

/// Side artifacts first, documents last, recording each file in `files`.
fn write_artifacts(
    conversion: &Conversion,
    stem: &str,
    dir: &Path,
    files: &mut Vec<PathBuf>,
) -> Result<Written, Error> {
    let mut written = Written::default();

    if !conversion.tables.is_empty() {
        let tables_dir = dir.join(format!("{}_tables", stem));
        create_dir(&tables_dir)?;
        for table in &conversion.tables {
            files.push(write_file(tables_dir.join(table.file_name()), &table.content)?);
            written.tables += 1;
        }
    }

    for media in &conversion.media {
        let path = dir.join(&media.path);
        let result = match path.parent() {
            Some(parent) => create_dir(parent),
            None => Ok(()),
        }
        .and_then(|_| write_file(path, &media.bytes));

        match result {
            Ok(path) => {
                files.push(path);
                written.media += 1;
            }
            Err(e) => warn!("Skipping image {}: {}", media.path, e),
        }
    }

    if conversion.pages.is_empty() {
        let path = write_file(dir.join(format!("{}.md", stem)), &conversion.markdown)?;
        files.push(path.clone());
        written.documents.push(path);
    } else {
        for (i, page) in conversion.pages.iter().enumerate() {
            let path = write_file(dir.join(format!("{}_page{}.md", stem, i + 1)), page)?;
            files.push(path.clone());
            written.documents.push(path);
        }
    }

    Ok(written)
}
