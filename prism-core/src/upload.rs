//! Preparing local files for a bucket upload.
//!
//! Buckets only accept gzip-compressed CSV. `.csv.gz` and `.gz` files are read
//! as-is; plain `.csv` files are compressed in memory and sent as `<name>.gz`.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::error::{PrismError, Result};
use crate::model::UploadFile;

/// What to do with a file, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Gzip,
    Csv,
}

impl FileKind {
    pub fn of(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".gz") {
            Some(FileKind::Gzip)
        } else if name.ends_with(".csv") {
            Some(FileKind::Csv)
        } else {
            None
        }
    }
}

/// Check that every path exists and has an uploadable extension.
///
/// Runs before any bucket is created so a bad argument never leaves an
/// orphaned bucket behind.
pub fn validate_files(paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Err(PrismError::InvalidFile {
            path: PathBuf::new(),
            reason: "no files given".into(),
        });
    }
    for path in paths {
        if FileKind::of(path).is_none() {
            return Err(PrismError::InvalidFile {
                path: path.clone(),
                reason: "expected a .csv, .csv.gz or .gz file".into(),
            });
        }
        if !path.is_file() {
            return Err(PrismError::InvalidFile {
                path: path.clone(),
                reason: "file not found".into(),
            });
        }
    }
    Ok(())
}

pub fn gzip(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

impl UploadFile {
    /// Read `path`, compressing it when it is a plain CSV.
    pub fn from_path(path: &Path) -> Result<Self> {
        let kind = FileKind::of(path).ok_or_else(|| PrismError::InvalidFile {
            path: path.to_path_buf(),
            reason: "expected a .csv, .csv.gz or .gz file".into(),
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| PrismError::InvalidFile {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".into(),
            })?;
        let raw = std::fs::read(path).map_err(|e| PrismError::InvalidFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let file = match kind {
            FileKind::Gzip => UploadFile {
                file_name,
                content: raw,
            },
            FileKind::Csv => {
                let content = gzip(&raw)?;
                debug!(
                    path = %path.display(),
                    raw_bytes = raw.len(),
                    gzip_bytes = content.len(),
                    "Compressed CSV for upload"
                );
                UploadFile {
                    file_name: format!("{file_name}.gz"),
                    content,
                }
            }
        };
        info!(path = %path.display(), upload_as = %file.file_name, "Prepared upload file");
        Ok(file)
    }

    /// A gzip file with no rows, used to truncate a table.
    pub fn empty() -> Result<Self> {
        Ok(UploadFile {
            file_name: "empty.csv.gz".to_string(),
            content: gzip(b"")?,
        })
    }
}
