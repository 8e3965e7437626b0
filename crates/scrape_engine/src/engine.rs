use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use scrape_logging::{scrape_info, scrape_warn};

use crate::job::{JobHandle, ScrapeJob};
use crate::sink::ChannelProgressSink;
use crate::{EngineConfig, EngineEvent, JobError, JobId};

enum EngineCommand {
    Start { job_id: JobId, layer_url: String },
    Stop { job_id: JobId },
}

/// Runs scrape jobs on a dedicated tokio runtime thread.
///
/// Callers submit jobs and poll events; dropping the handle shuts the
/// runtime down once pending blocking work has finished.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::Builder::new()
            .name("scrape-engine".to_string())
            .spawn(move || {
                let mut jobs: HashMap<JobId, JobHandle> = HashMap::new();
                while let Ok(command) = cmd_rx.recv() {
                    jobs.retain(|_, handle| !handle.state().is_terminal());
                    match command {
                        EngineCommand::Start { job_id, layer_url } => {
                            let job = match ScrapeJob::from_config(layer_url, config.clone()) {
                                Ok(job) => job.with_id(job_id),
                                Err(err) => {
                                    let _ = event_tx.send(EngineEvent::JobCompleted {
                                        job_id,
                                        result: Err(JobError::Enumeration(err)),
                                    });
                                    continue;
                                }
                            };
                            jobs.insert(job_id, job.handle());
                            let event_tx = event_tx.clone();
                            runtime.spawn(async move {
                                let sink = ChannelProgressSink::new(event_tx.clone());
                                let result = job.run(&sink).await;
                                let _ = event_tx.send(EngineEvent::JobCompleted { job_id, result });
                            });
                        }
                        EngineCommand::Stop { job_id } => match jobs.remove(&job_id) {
                            Some(handle) => handle.stop(),
                            None => scrape_warn!("Stop for unknown or finished job {}", job_id),
                        },
                    }
                }
                scrape_info!("Engine shutting down");
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn start(&self, job_id: JobId, layer_url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Start {
            job_id,
            layer_url: layer_url.into(),
        });
    }

    pub fn stop(&self, job_id: JobId) {
        let _ = self.cmd_tx.send(EngineCommand::Stop { job_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event. `Disconnected` means the
    /// engine thread is gone and no further events will arrive.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }
}
