//! RON configuration file for the command-line front end.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use scrape_engine::{AtomicFileWriter, ChunkStorage, EngineConfig, FetchSettings, OutputFormat};
use scrape_logging::scrape_info;
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Format {
    #[default]
    Shapefile,
    GeoPackage,
    GeoJson,
}

impl Format {
    fn output_format(self) -> OutputFormat {
        match self {
            Format::Shapefile => OutputFormat::shapefile(),
            Format::GeoPackage => OutputFormat::geopackage(),
            Format::GeoJson => OutputFormat::geojson(),
        }
    }
}

/// Settings read from the config file. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_folder: PathBuf,
    pub chunk_size: usize,
    pub id_field: String,
    pub max_concurrent_batches: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub out_sr: u32,
    pub format: Format,
    pub ogr2ogr: PathBuf,
    pub keep_intermediates: bool,
    pub chunks_in_memory: bool,
    pub log_level: String,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            output_folder: engine.output_folder,
            chunk_size: engine.chunk_size,
            id_field: engine.id_field,
            max_concurrent_batches: engine.max_concurrent_batches,
            connect_timeout_secs: engine.fetch.connect_timeout.as_secs(),
            request_timeout_secs: engine.fetch.request_timeout.as_secs(),
            max_response_bytes: engine.fetch.max_bytes,
            out_sr: engine.fetch.out_sr,
            format: Format::default(),
            ogr2ogr: engine.ogr2ogr,
            keep_intermediates: !engine.cleanup_intermediates,
            chunks_in_memory: engine.storage == ChunkStorage::Memory,
            log_level: "info".to_string(),
            log_destination: LogDestination::Both,
        }
    }
}

impl AppConfig {
    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Writes the config as pretty RON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())
            .context("serializing config")?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = path
            .file_name()
            .with_context(|| format!("{} has no file name", path.display()))?
            .to_string_lossy();
        AtomicFileWriter::new(dir)
            .write(&filename, content.as_bytes())
            .with_context(|| format!("writing config {}", path.display()))?;
        scrape_info!("Wrote config to {}", path.display());
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            output_folder: self.output_folder.clone(),
            chunk_size: self.chunk_size,
            id_field: self.id_field.clone(),
            max_concurrent_batches: self.max_concurrent_batches.max(1),
            fetch: FetchSettings {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_bytes: self.max_response_bytes,
                out_sr: self.out_sr,
            },
            format: self.format.output_format(),
            ogr2ogr: self.ogr2ogr.clone(),
            storage: if self.chunks_in_memory {
                ChunkStorage::Memory
            } else {
                ChunkStorage::Files
            },
            cleanup_intermediates: !self.keep_intermediates,
        }
    }
}
