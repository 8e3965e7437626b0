use std::path::PathBuf;

use scrape_core::{CHUNK_SIZE, ID_FIELD};

use crate::convert::OutputFormat;
use crate::fetch::FetchSettings;

/// Where batch responses live between persist and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStorage {
    /// `{output}/{layer}{index}.json`
    #[default]
    Files,
    Memory,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub output_folder: PathBuf,
    pub chunk_size: usize,
    pub id_field: String,
    /// Upper bound on batch pipelines in flight per job.
    pub max_concurrent_batches: usize,
    pub fetch: FetchSettings,
    pub format: OutputFormat,
    pub ogr2ogr: PathBuf,
    pub storage: ChunkStorage,
    pub cleanup_intermediates: bool,
}

impl EngineConfig {
    pub fn default_with_output(output_folder: PathBuf) -> Self {
        Self {
            output_folder,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("output"),
            chunk_size: CHUNK_SIZE,
            id_field: ID_FIELD.to_string(),
            max_concurrent_batches: 8,
            fetch: FetchSettings::default(),
            format: OutputFormat::default(),
            ogr2ogr: PathBuf::from("ogr2ogr"),
            storage: ChunkStorage::default(),
            cleanup_intermediates: true,
        }
    }
}
