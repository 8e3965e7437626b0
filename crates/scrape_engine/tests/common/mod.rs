#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use scrape_core::{IdChunker, ObjectId};
use scrape_engine::{
    ArchiveError, ConversionError, EngineEvent, LayerPaths, MemoryChunkStore, PersistedChunk,
    Pool, PoolFactory, ProgressSink, ResultCollector,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LAYER_PATH: &str = "/arcgis/rest/services/Test/MapServer/0";

pub fn layer_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), LAYER_PATH)
}

pub fn int_ids(n: i64) -> Vec<ObjectId> {
    (1..=n).map(ObjectId::Int).collect()
}

/// Where clauses the job will send for ids `1..=n`.
pub fn where_clauses(n: i64) -> Vec<String> {
    IdChunker::new()
        .chunk(&int_ids(n))
        .iter()
        .map(|b| b.where_clause())
        .collect()
}

pub async fn mount_metadata(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path(LAYER_PATH))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .mount(server)
        .await;
}

pub async fn mount_ids(server: &MockServer, n: i64) {
    let ids: Vec<i64> = (1..=n).collect();
    Mock::given(method("GET"))
        .and(path(format!("{LAYER_PATH}/query")))
        .and(query_param("returnIdsOnly", "true"))
        .and(query_param("outSR", "3857"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectIds": ids })))
        .mount(server)
        .await;
}

pub async fn mount_batch(server: &MockServer, where_clause: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("{LAYER_PATH}/query")))
        .and(query_param("outFields", "*"))
        .and(query_param("where", where_clause))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

pub fn features(batch: usize) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "geometryType": "esriGeometryPoint",
        "features": [{ "attributes": { "batch": batch } }]
    }))
}

/// Layer with `n` ids where every batch succeeds.
pub async fn healthy_layer(name: &str, n: i64) -> MockServer {
    let server = MockServer::start().await;
    mount_metadata(&server, name).await;
    mount_ids(&server, n).await;
    for (batch, clause) in where_clauses(n).iter().enumerate() {
        mount_batch(&server, clause, features(batch)).await;
    }
    server
}

/// Collector double that records what the job hands it.
#[derive(Default)]
pub struct RecordingCollector {
    pub chunks: Mutex<Vec<PersistedChunk>>,
    pub convert_calls: AtomicUsize,
    pub archive_calls: AtomicUsize,
    pub cleanup_calls: AtomicUsize,
    pub pooled_at_convert: AtomicUsize,
    pub archived: Mutex<Vec<usize>>,
    pub fail_conversion: bool,
    pub archive_path: PathBuf,
}

impl RecordingCollector {
    pub fn new(archive_path: PathBuf) -> Self {
        Self {
            archive_path,
            ..Self::default()
        }
    }

    pub fn failing_conversion(archive_path: PathBuf) -> Self {
        Self {
            archive_path,
            fail_conversion: true,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl ResultCollector for RecordingCollector {
    fn register(&self, chunk: PersistedChunk) {
        self.chunks.lock().unwrap().push(chunk);
    }

    fn pooled(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    async fn convert(&self) -> Result<(), ConversionError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        self.pooled_at_convert.store(self.pooled(), Ordering::SeqCst);
        if self.fail_conversion {
            return Err(ConversionError::ToolFailed {
                input: "pool".into(),
                status_code: Some(1),
            });
        }
        Ok(())
    }

    async fn archive(&self) -> Result<PathBuf, ArchiveError> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        let mut indices: Vec<usize> = self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .map(PersistedChunk::index)
            .collect();
        indices.sort();
        *self.archived.lock().unwrap() = indices;
        Ok(self.archive_path.clone())
    }

    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn wait_for_cleanup(&self) {}
}

/// Pools backed by memory chunks and one shared recording collector.
pub struct RecordingPools {
    pub collector: Arc<RecordingCollector>,
    pub opened: Mutex<Vec<LayerPaths>>,
}

impl RecordingPools {
    pub fn new(collector: RecordingCollector) -> Arc<Self> {
        Arc::new(Self {
            collector: Arc::new(collector),
            opened: Mutex::new(Vec::new()),
        })
    }
}

impl PoolFactory for RecordingPools {
    fn open(&self, paths: &LayerPaths) -> Pool {
        self.opened.lock().unwrap().push(paths.clone());
        Pool {
            store: Arc::new(MemoryChunkStore),
            collector: self.collector.clone(),
        }
    }
}

#[derive(Default)]
pub struct TestSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl TestSink {
    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
