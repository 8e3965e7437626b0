use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        if !self.dir.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // persist() replaces an existing target.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// One batch's persisted response, owned by the pool once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedChunk {
    File { index: usize, path: PathBuf },
    Memory { index: usize, bytes: Vec<u8> },
}

impl PersistedChunk {
    pub fn index(&self) -> usize {
        match self {
            PersistedChunk::File { index, .. } | PersistedChunk::Memory { index, .. } => *index,
        }
    }
}

/// Where parsed batch responses are kept until conversion.
pub trait ChunkStore: Send + Sync {
    fn persist(&self, index: usize, document: &serde_json::Value)
        -> Result<PersistedChunk, PersistError>;
}

/// Writes each chunk to `{folder}/{stem}{index}.json`.
#[derive(Debug, Clone)]
pub struct FileChunkStore {
    folder: PathBuf,
    stem: String,
}

impl FileChunkStore {
    pub fn new(folder: PathBuf, stem: impl Into<String>) -> Self {
        Self {
            folder,
            stem: stem.into(),
        }
    }

    pub fn chunk_filename(&self, index: usize) -> String {
        format!("{}{index}.json", self.stem)
    }
}

impl ChunkStore for FileChunkStore {
    fn persist(
        &self,
        index: usize,
        document: &serde_json::Value,
    ) -> Result<PersistedChunk, PersistError> {
        let content = serde_json::to_vec(document).map_err(io::Error::from)?;
        let writer = AtomicFileWriter::new(self.folder.clone());
        let path = writer.write(&self.chunk_filename(index), &content)?;
        Ok(PersistedChunk::File { index, path })
    }
}

/// Keeps chunks in memory; the collector stages them when the tool needs files.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryChunkStore;

impl ChunkStore for MemoryChunkStore {
    fn persist(
        &self,
        index: usize,
        document: &serde_json::Value,
    ) -> Result<PersistedChunk, PersistError> {
        let bytes = serde_json::to_vec(document).map_err(io::Error::from)?;
        Ok(PersistedChunk::Memory { index, bytes })
    }
}
