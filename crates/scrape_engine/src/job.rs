use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use scrape_core::{
    advance, IdBatch, IdChunker, JobReport, JobState, JobStatus, LifecycleMsg, ProgressTracker,
};
use scrape_logging::{scrape_debug, scrape_error, scrape_info, scrape_warn};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::fetch::{ArcGisClient, LayerSource};
use crate::paths::LayerPaths;
use crate::persist::ensure_output_dir;
use crate::pipeline::{run_batch, BatchContext};
use crate::pool::{OgrPoolFactory, PoolFactory};
use crate::{EngineEvent, FetchError, JobError, JobId, JobProgress, ProgressSink};

struct JobShared {
    state: watch::Sender<JobState>,
    tracker: Arc<ProgressTracker>,
    layer_name: OnceLock<String>,
    output: OnceLock<PathBuf>,
    cancel: CancellationToken,
}

/// Cloneable view of a running job for polling callers.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        let state = self.state();
        JobStatus {
            layer_name: self.name(),
            state,
            progress: self.shared.tracker.snapshot(),
            output: self.output(),
        }
    }

    pub fn state(&self) -> JobState {
        *self.shared.state.borrow()
    }

    /// Live lifecycle updates.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.shared.state.subscribe()
    }

    pub fn is_job_done(&self) -> bool {
        self.state() == JobState::Done
    }

    pub fn is_failed(&self) -> bool {
        self.shared.tracker.is_failed()
    }

    pub fn fail_message(&self) -> Option<String> {
        self.shared.tracker.fail_message().map(ToOwned::to_owned)
    }

    /// Archive path, only once the job is done.
    pub fn output(&self) -> Option<PathBuf> {
        if self.is_job_done() {
            self.shared.output.get().cloned()
        } else {
            None
        }
    }

    pub fn num_done(&self) -> usize {
        self.shared.tracker.done()
    }

    pub fn total(&self) -> usize {
        self.shared.tracker.total()
    }

    pub fn name(&self) -> Option<String> {
        self.shared.layer_name.get().cloned()
    }

    /// Abandons the job at once. In-flight batches are aborted and no
    /// completion guarantee is made.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }
}

/// Retrieves every feature of one layer, then converts and archives them.
pub struct ScrapeJob {
    id: JobId,
    layer_url: String,
    config: EngineConfig,
    source: Arc<dyn LayerSource>,
    pools: Arc<dyn PoolFactory>,
    shared: Arc<JobShared>,
}

impl ScrapeJob {
    pub fn new(
        layer_url: impl Into<String>,
        config: EngineConfig,
        source: Arc<dyn LayerSource>,
        pools: Arc<dyn PoolFactory>,
    ) -> Self {
        let (state, _) = watch::channel(JobState::Created);
        Self {
            id: 0,
            layer_url: layer_url.into(),
            config,
            source,
            pools,
            shared: Arc::new(JobShared {
                state,
                tracker: Arc::new(ProgressTracker::new()),
                layer_name: OnceLock::new(),
                output: OnceLock::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Job backed by the ArcGIS REST client and the ogr2ogr collector.
    pub fn from_config(layer_url: impl Into<String>, config: EngineConfig) -> Result<Self, FetchError> {
        let source = Arc::new(ArcGisClient::new(config.fetch.clone())?);
        let pools = Arc::new(OgrPoolFactory::from_config(&config));
        Ok(Self::new(layer_url, config, source, pools))
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Drives the job to `Done`.
    ///
    /// Only enumeration and output-folder failures end the job early. Batch,
    /// conversion and archive failures are recorded on the handle and the
    /// job still completes.
    pub async fn run(self, sink: &dyn ProgressSink) -> Result<JobReport, JobError> {
        let cancel = self.shared.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                scrape_warn!("Job {} stopped: {}", self.id, self.layer_url);
                self.shared.tracker.record_failure("stopped");
                self.force_failed(sink);
                Err(JobError::Stopped)
            }
            result = self.drive(sink) => result,
        }
    }

    async fn drive(&self, sink: &dyn ProgressSink) -> Result<JobReport, JobError> {
        self.transition(LifecycleMsg::Start, sink)?;

        let layer_name = self
            .source
            .layer_name(&self.layer_url)
            .await
            .map_err(|err| self.fatal(JobError::Enumeration(err), sink))?;
        let _ = self.shared.layer_name.set(layer_name.clone());

        let ids = self
            .source
            .object_ids(&self.layer_url)
            .await
            .map_err(|err| self.fatal(JobError::Enumeration(err), sink))?;
        scrape_info!("Layer '{}' has {} object ids", layer_name, ids.len());

        let paths = LayerPaths::new(&self.config.output_folder, &layer_name);
        ensure_output_dir(&paths.folder)
            .map_err(|err| self.fatal(JobError::Output(err.to_string()), sink))?;
        let pool = self.pools.open(&paths);

        let batches = IdChunker::with_chunk_size(self.config.chunk_size)
            .with_field(self.config.id_field.as_str())
            .chunk(&ids);
        self.shared.tracker.fix_total(batches.len());
        self.transition(LifecycleMsg::BatchesReady, sink)?;

        let ctx = Arc::new(BatchContext {
            layer_url: self.layer_url.clone(),
            source: Arc::clone(&self.source),
            store: pool.store,
            collector: Arc::clone(&pool.collector),
            tracker: Arc::clone(&self.shared.tracker),
        });
        self.dispatch(batches, ctx, sink).await;
        self.transition(LifecycleMsg::BatchesSettled, sink)?;

        if let Err(err) = pool.collector.convert().await {
            scrape_error!("Conversion of '{}' failed: {}", layer_name, err);
            self.shared.tracker.record_failure(format!("conversion: {err}"));
        }
        self.transition(LifecycleMsg::ConversionFinished, sink)?;

        match pool.collector.archive().await {
            Ok(path) => {
                let _ = self.shared.output.set(path);
            }
            Err(err) => {
                scrape_error!("Archiving '{}' failed: {}", layer_name, err);
                self.shared.tracker.record_failure(format!("archive: {err}"));
            }
        }
        self.transition(LifecycleMsg::Archived, sink)?;
        pool.collector.cleanup().await;
        scrape_info!("Done with url: {}", self.layer_url);

        let snapshot = self.shared.tracker.snapshot();
        Ok(JobReport {
            layer_name,
            done: snapshot.done,
            total: snapshot.total,
            failed: snapshot.failed,
            fail_message: snapshot.fail_message,
            output: self.shared.output.get().cloned(),
        })
    }

    /// Runs every batch with at most `max_concurrent_batches` in flight and
    /// returns once all of them settled.
    async fn dispatch(&self, batches: Vec<IdBatch>, ctx: Arc<BatchContext>, sink: &dyn ProgressSink) {
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut tasks = JoinSet::new();
        for batch in batches {
            let ctx = Arc::clone(&ctx);
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let _permit = limit.acquire().await;
                run_batch(&ctx, &batch).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => scrape_debug!("Batch settled: {:?}", outcome),
                Err(err) => {
                    scrape_error!("Batch task died: {}", err);
                    self.shared
                        .tracker
                        .record_failure(format!("transport: batch task died: {err}"));
                }
            }
            self.emit_progress(sink);
        }
    }

    fn transition(&self, msg: LifecycleMsg, sink: &dyn ProgressSink) -> Result<(), JobError> {
        let mut result = Ok(());
        self.shared.state.send_if_modified(|state| match advance(*state, msg) {
            Ok(next) => {
                scrape_info!("Job {} '{}': {} -> {}", self.id, self.layer_url, state, next);
                *state = next;
                true
            }
            Err(err) => {
                result = Err(JobError::from(err));
                false
            }
        });
        self.emit_progress(sink);
        result
    }

    fn fatal(&self, err: JobError, sink: &dyn ProgressSink) -> JobError {
        scrape_error!("Job {} '{}' failed: {}", self.id, self.layer_url, err);
        self.shared.tracker.record_failure(err.to_string());
        self.force_failed(sink);
        err
    }

    fn force_failed(&self, sink: &dyn ProgressSink) {
        let _ = self.transition(LifecycleMsg::Fatal, sink);
    }

    fn emit_progress(&self, sink: &dyn ProgressSink) {
        sink.emit(EngineEvent::Progress(JobProgress {
            job_id: self.id,
            state: *self.shared.state.borrow(),
            progress: self.shared.tracker.snapshot(),
        }));
    }
}
