use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive task failed: {0}")]
    Task(String),
}

/// Content placed into the archive under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    File { name: String, path: PathBuf },
    Bytes { name: String, bytes: Vec<u8> },
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        match self {
            ArchiveEntry::File { name, .. } | ArchiveEntry::Bytes { name, .. } => name,
        }
    }
}

/// Writes `entries` into a fresh zip at `zip_path`, replacing any previous one.
pub fn write_archive(zip_path: &Path, entries: &[ArchiveEntry]) -> Result<PathBuf, ArchiveError> {
    let file = File::create(zip_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer.start_file(entry.name(), options)?;
        match entry {
            ArchiveEntry::File { path, .. } => {
                let mut source = File::open(path)?;
                io::copy(&mut source, &mut writer)?;
            }
            ArchiveEntry::Bytes { bytes, .. } => writer.write_all(bytes)?,
        }
    }
    writer.finish()?;

    Ok(fs::canonicalize(zip_path).unwrap_or_else(|_| zip_path.to_path_buf()))
}
