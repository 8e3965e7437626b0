use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scrape_logging::{scrape_debug, scrape_error, scrape_info, scrape_warn};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::archive::{write_archive, ArchiveEntry, ArchiveError};
use crate::convert::{ConversionTool, OutputFormat};
use crate::paths::LayerPaths;
use crate::persist::{PersistError, PersistedChunk};

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion tool could not run: {0}")]
    Spawn(#[source] io::Error),
    #[error("conversion tool exited with status {status_code:?} on {input}")]
    ToolFailed {
        input: String,
        status_code: Option<i32>,
    },
    #[error("staging chunk failed: {0}")]
    Staging(#[from] PersistError),
    #[error("preparing dataset folder failed: {0}")]
    DatasetDir(#[source] io::Error),
    #[error("conversion task failed: {0}")]
    Task(String),
}

/// Accumulates a job's persisted chunks, converts them and packages the result.
#[async_trait::async_trait]
pub trait ResultCollector: Send + Sync {
    /// Adds a chunk to the pool. Safe to call from many batches at once.
    fn register(&self, chunk: PersistedChunk);

    /// Number of chunks waiting in the pool.
    fn pooled(&self) -> usize;

    /// Converts the pool. On failure the pooled chunks are kept.
    async fn convert(&self) -> Result<(), ConversionError>;

    /// Packages whatever exists into the final artifact.
    async fn archive(&self) -> Result<PathBuf, ArchiveError>;

    /// Starts background removal of intermediates; returns immediately.
    async fn cleanup(&self);

    /// Waits for every background removal started so far.
    async fn wait_for_cleanup(&self);
}

/// [`ResultCollector`] backed by an external conversion tool and a zip archive.
pub struct OgrCollector {
    paths: LayerPaths,
    format: OutputFormat,
    tool: Arc<dyn ConversionTool>,
    pool: Mutex<Vec<PersistedChunk>>,
    cleanup_intermediates: bool,
    converted: AtomicBool,
    cleanup_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OgrCollector {
    pub fn new(paths: LayerPaths, format: OutputFormat, tool: Arc<dyn ConversionTool>) -> Self {
        Self {
            paths,
            format,
            tool,
            pool: Mutex::new(Vec::new()),
            cleanup_intermediates: true,
            converted: AtomicBool::new(false),
            cleanup_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.cleanup_intermediates = !keep;
        self
    }

    /// `{folder}/{stem}.dataset/{stem}{extension}`
    pub fn dataset_path(&self) -> PathBuf {
        self.paths
            .dataset_dir()
            .join(format!("{}{}", self.paths.stem, self.format.extension))
    }

    fn pool(&self) -> MutexGuard<'_, Vec<PersistedChunk>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_pool(&self) -> Vec<PersistedChunk> {
        let mut chunks = std::mem::take(&mut *self.pool());
        chunks.sort_by_key(PersistedChunk::index);
        chunks
    }

    fn pool_snapshot(&self) -> Vec<PersistedChunk> {
        let mut chunks = self.pool().clone();
        chunks.sort_by_key(PersistedChunk::index);
        chunks
    }

    fn restore_pool(&self, chunks: Vec<PersistedChunk>) {
        self.pool().extend(chunks);
    }

    fn track(&self, task: JoinHandle<()>) {
        self.cleanup_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    async fn run_tool(&self, chunks: &[PersistedChunk]) -> Result<(), ConversionError> {
        let dataset = self.dataset_path();
        for (position, chunk) in chunks.iter().enumerate() {
            // Staged copies of in-memory chunks are removed when dropped.
            let staged;
            let input: &Path = match chunk {
                PersistedChunk::File { path, .. } => path,
                PersistedChunk::Memory { index, bytes } => {
                    staged = stage_chunk(&self.paths, *index, bytes)?;
                    staged.path()
                }
            };

            let output = self
                .tool
                .convert(input, &dataset, &self.format, position > 0)
                .await
                .map_err(|err| {
                    scrape_error!("Conversion tool failed to run: {}", err);
                    ConversionError::Spawn(err)
                })?;
            if !output.stderr.is_empty() {
                scrape_warn!("{}", output.stderr);
            }
            if !output.success {
                return Err(ConversionError::ToolFailed {
                    input: input.display().to_string(),
                    status_code: output.status_code,
                });
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResultCollector for OgrCollector {
    fn register(&self, chunk: PersistedChunk) {
        scrape_debug!("Pooled chunk {}", chunk.index());
        self.pool().push(chunk);
    }

    fn pooled(&self) -> usize {
        self.pool().len()
    }

    async fn convert(&self) -> Result<(), ConversionError> {
        // Outputs of an earlier run would end up in the archive.
        let dir = self.paths.dataset_dir();
        tokio::task::spawn_blocking(move || reset_dir(&dir))
            .await
            .map_err(|err| ConversionError::Task(err.to_string()))?
            .map_err(ConversionError::DatasetDir)?;

        let chunks = self.take_pool();
        if chunks.is_empty() {
            scrape_info!("Nothing to convert for '{}'", self.paths.layer_name);
            self.converted.store(true, Ordering::Release);
            return Ok(());
        }

        if let Err(err) = self.run_tool(&chunks).await {
            self.restore_pool(chunks);
            return Err(err);
        }

        scrape_info!(
            "Converted {} chunk(s) into '{}'",
            chunks.len(),
            self.dataset_path().display()
        );
        self.converted.store(true, Ordering::Release);

        let originals: Vec<PathBuf> = chunks
            .into_iter()
            .filter_map(|chunk| match chunk {
                PersistedChunk::File { path, .. } => Some(path),
                PersistedChunk::Memory { .. } => None,
            })
            .collect();
        if !originals.is_empty() {
            self.track(tokio::task::spawn_blocking(move || remove_files(&originals)));
        }
        Ok(())
    }

    async fn archive(&self) -> Result<PathBuf, ArchiveError> {
        // Chunks still pooled were never converted; ship them raw.
        let mut raw = Vec::new();
        for chunk in self.pool_snapshot() {
            raw.push(match chunk {
                PersistedChunk::File { index, path } => ArchiveEntry::File {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| format!("{}{index}.json", self.paths.stem)),
                    path,
                },
                PersistedChunk::Memory { index, bytes } => ArchiveEntry::Bytes {
                    name: format!("{}{index}.json", self.paths.stem),
                    bytes,
                },
            });
        }

        let dataset_dir = self
            .converted
            .load(Ordering::Acquire)
            .then(|| self.paths.dataset_dir());
        let zip_path = self.paths.archive();
        let (path, count) = tokio::task::spawn_blocking(move || {
            let mut entries: Vec<ArchiveEntry> = dataset_dir
                .map(|dir| dataset_files(&dir))
                .unwrap_or_default()
                .into_iter()
                .filter_map(|path| {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    Some(ArchiveEntry::File { name, path })
                })
                .collect();
            entries.extend(raw);
            write_archive(&zip_path, &entries).map(|path| (path, entries.len()))
        })
        .await
        .map_err(|err| ArchiveError::Task(err.to_string()))??;
        scrape_info!("Zipped {} file(s) into '{}'", count, path.display());
        Ok(path)
    }

    async fn cleanup(&self) {
        if !self.cleanup_intermediates {
            return;
        }
        let dir = self.paths.dataset_dir();
        self.track(tokio::task::spawn_blocking(move || remove_dir(&dir)));
    }

    async fn wait_for_cleanup(&self) {
        let tasks = std::mem::take(
            &mut *self
                .cleanup_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(err) = task.await {
                scrape_warn!("Cleanup task failed: {}", err);
            }
        }
    }
}

fn stage_chunk(paths: &LayerPaths, index: usize, bytes: &[u8]) -> Result<NamedTempFile, PersistError> {
    use std::io::Write;

    let mut staged = tempfile::Builder::new()
        .prefix(&format!("{}{index}-", paths.stem))
        .suffix(".json")
        .tempfile_in(&paths.folder)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

/// Empties the dataset folder, creating it if needed.
fn reset_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::create_dir_all(dir)
}

fn dataset_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            scrape_warn!("Couldn't list {}: {}", dir.display(), err);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

fn remove_dir(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        if err.kind() != io::ErrorKind::NotFound {
            scrape_warn!("Couldn't delete {}: {}", dir.display(), err);
        }
    }
}

fn remove_files(files: &[PathBuf]) {
    for file in files {
        if let Err(err) = fs::remove_file(file) {
            if err.kind() != io::ErrorKind::NotFound {
                scrape_warn!("Couldn't delete {}: {}", file.display(), err);
            }
        }
    }
}
