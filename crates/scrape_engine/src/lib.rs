//! Scrape engine: layer fetching, batch pipelines, conversion and job orchestration.
mod archive;
mod collector;
mod config;
mod convert;
mod engine;
mod fetch;
mod job;
mod paths;
mod persist;
mod pipeline;
mod pool;
mod sink;
mod types;

pub use archive::{write_archive, ArchiveEntry, ArchiveError};
pub use collector::{ConversionError, OgrCollector, ResultCollector};
pub use config::{ChunkStorage, EngineConfig};
pub use convert::{ConversionTool, Ogr2Ogr, OutputFormat, ToolOutput};
pub use engine::EngineHandle;
pub use fetch::{parse_json_document, ArcGisClient, FetchSettings, LayerSource};
pub use job::{JobHandle, ScrapeJob};
pub use paths::{sanitize_layer_name, LayerPaths};
pub use persist::{
    ensure_output_dir, AtomicFileWriter, ChunkStore, FileChunkStore, MemoryChunkStore,
    PersistError, PersistedChunk,
};
pub use pipeline::{run_batch, BatchContext, BatchOutcome};
pub use pool::{OgrPoolFactory, Pool, PoolFactory};
pub use sink::{ChannelProgressSink, NullProgressSink, ProgressSink};
pub use types::{EngineEvent, FailureKind, FetchError, JobError, JobId, JobProgress};
