use std::sync::Arc;

use crate::collector::{OgrCollector, ResultCollector};
use crate::config::{ChunkStorage, EngineConfig};
use crate::convert::{ConversionTool, Ogr2Ogr, OutputFormat};
use crate::paths::LayerPaths;
use crate::persist::{ChunkStore, FileChunkStore, MemoryChunkStore};

/// Storage and collector pair for one job.
#[derive(Clone)]
pub struct Pool {
    pub store: Arc<dyn ChunkStore>,
    pub collector: Arc<dyn ResultCollector>,
}

/// Opens a pool once the layer name is known.
pub trait PoolFactory: Send + Sync {
    fn open(&self, paths: &LayerPaths) -> Pool;
}

pub struct OgrPoolFactory {
    storage: ChunkStorage,
    format: OutputFormat,
    tool: Arc<dyn ConversionTool>,
    cleanup_intermediates: bool,
}

impl OgrPoolFactory {
    pub fn new(storage: ChunkStorage, format: OutputFormat, tool: Arc<dyn ConversionTool>) -> Self {
        Self {
            storage,
            format,
            tool,
            cleanup_intermediates: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut factory = Self::new(
            config.storage,
            config.format.clone(),
            Arc::new(Ogr2Ogr::new(config.ogr2ogr.clone())),
        );
        factory.cleanup_intermediates = config.cleanup_intermediates;
        factory
    }
}

impl PoolFactory for OgrPoolFactory {
    fn open(&self, paths: &LayerPaths) -> Pool {
        let store: Arc<dyn ChunkStore> = match self.storage {
            ChunkStorage::Files => Arc::new(FileChunkStore::new(paths.folder.clone(), &paths.stem)),
            ChunkStorage::Memory => Arc::new(MemoryChunkStore),
        };
        let collector = OgrCollector::new(paths.clone(), self.format.clone(), Arc::clone(&self.tool))
            .keep_intermediates(!self.cleanup_intermediates);
        Pool {
            store,
            collector: Arc::new(collector),
        }
    }
}
