use std::sync::Arc;
use std::time::Instant;

use scrape_core::{IdBatch, ProgressTracker};
use scrape_logging::{scrape_debug, scrape_error, scrape_info};

use crate::collector::ResultCollector;
use crate::fetch::{parse_json_document, LayerSource};
use crate::persist::ChunkStore;

/// Everything one batch needs; shared by all batches of a job.
pub struct BatchContext {
    pub layer_url: String,
    pub source: Arc<dyn LayerSource>,
    pub store: Arc<dyn ChunkStore>,
    pub collector: Arc<dyn ResultCollector>,
    pub tracker: Arc<ProgressTracker>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Persisted { batch: usize, persist_index: usize },
    Failed { batch: usize, message: String },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Persisted { .. })
    }
}

/// Fetches, parses, persists and registers one batch.
///
/// Exactly one counter mutation happens per call: `record_success` or
/// `record_failure`. Failures stay local to this batch.
pub async fn run_batch(ctx: &BatchContext, batch: &IdBatch) -> BatchOutcome {
    match fetch_and_persist(ctx, batch).await {
        Ok(persist_index) => {
            ctx.tracker.record_success();
            BatchOutcome::Persisted {
                batch: batch.index(),
                persist_index,
            }
        }
        Err(message) => {
            scrape_error!("Batch {} failed: {}", batch.index(), message);
            ctx.tracker.record_failure(message.clone());
            BatchOutcome::Failed {
                batch: batch.index(),
                message,
            }
        }
    }
}

async fn fetch_and_persist(ctx: &BatchContext, batch: &IdBatch) -> Result<usize, String> {
    let before = Instant::now();
    let body = ctx
        .source
        .query_batch(&ctx.layer_url, &batch.where_clause())
        .await
        .map_err(|err| format!("{}: {err}", err.category()))?;
    scrape_info!(
        "Request for batch {} took {}ms",
        batch.index(),
        before.elapsed().as_millis()
    );

    let document = parse_json_document(&body).map_err(|err| format!("{}: {err}", err.category()))?;
    scrape_debug!("Done parsing batch {}", batch.index());

    let before = Instant::now();
    let persist_index = ctx.tracker.next_persist_index();
    let store = Arc::clone(&ctx.store);
    let chunk = tokio::task::spawn_blocking(move || store.persist(persist_index, &document))
        .await
        .map_err(|err| format!("persist: {err}"))?
        .map_err(|err| format!("persist: {err}"))?;
    scrape_info!(
        "Writing batch {} took {}ms",
        batch.index(),
        before.elapsed().as_millis()
    );

    ctx.collector.register(chunk);
    Ok(persist_index)
}
