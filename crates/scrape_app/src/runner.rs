use std::collections::HashMap;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use scrape_core::{JobState, ProgressSnapshot};
use scrape_engine::{EngineEvent, EngineHandle, JobId, JobProgress};
use scrape_logging::{scrape_error, scrape_info, scrape_warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How the submitted layers ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
}

impl Summary {
    pub fn all_complete(&self) -> bool {
        self.partial == 0 && self.failed == 0
    }
}

/// The engine operations the runner drives.
pub trait Engine {
    fn start(&self, job_id: JobId, layer_url: &str);
    fn stop(&self, job_id: JobId);
    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError>;
}

impl Engine for EngineHandle {
    fn start(&self, job_id: JobId, layer_url: &str) {
        EngineHandle::start(self, job_id, layer_url);
    }

    fn stop(&self, job_id: JobId) {
        EngineHandle::stop(self, job_id);
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        EngineHandle::recv_timeout(self, timeout)
    }
}

/// Submits every layer and polls engine events until all jobs settle. Jobs
/// still running when `deadline` passes are stopped.
pub fn run_layers(engine: &impl Engine, urls: &[String], deadline: Option<Duration>) -> Summary {
    let started = Instant::now();
    let mut pending: HashMap<JobId, &str> = HashMap::new();
    for (job_id, url) in (1..).zip(urls) {
        scrape_info!("Start job_id={} url={}", job_id, url);
        engine.start(job_id, url);
        pending.insert(job_id, url.as_str());
    }

    let mut last_seen: HashMap<JobId, (JobState, usize)> = HashMap::new();
    let mut summary = Summary::default();
    let mut stopped = false;

    while !pending.is_empty() {
        if !stopped && deadline.is_some_and(|limit| started.elapsed() >= limit) {
            scrape_warn!("Deadline reached, stopping {} job(s)", pending.len());
            for job_id in pending.keys() {
                engine.stop(*job_id);
            }
            stopped = true;
        }

        let event = match engine.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                scrape_error!("Engine stopped with {} job(s) pending", pending.len());
                for url in pending.values() {
                    println!("{url}: failed: engine stopped");
                }
                summary.failed += pending.len();
                break;
            }
        };
        match event {
            EngineEvent::Progress(progress) => {
                let key = (progress.state, progress.progress.done);
                if last_seen.insert(progress.job_id, key) != Some(key) {
                    let url = pending.get(&progress.job_id).copied().unwrap_or("?");
                    println!("{}", progress_line(url, &progress));
                }
            }
            EngineEvent::JobCompleted { job_id, result } => {
                let url = pending.remove(&job_id).unwrap_or("?");
                match result {
                    Ok(report) if report.is_complete() => {
                        summary.complete += 1;
                        println!("{url}: done -> {}", output_label(&report.output));
                    }
                    Ok(report) => {
                        summary.partial += 1;
                        println!(
                            "{url}: done with errors ({}/{} batches) -> {}: {}",
                            report.done,
                            report.total,
                            output_label(&report.output),
                            report.fail_message.as_deref().unwrap_or("unknown failure")
                        );
                    }
                    Err(err) => {
                        summary.failed += 1;
                        println!("{url}: failed: {err}");
                    }
                }
            }
        }
    }
    summary
}

fn progress_line(url: &str, progress: &JobProgress) -> String {
    let ProgressSnapshot {
        done,
        total,
        failed,
        ..
    } = progress.progress;
    let marker = if failed { " (with failures)" } else { "" };
    format!("{url}: {} {done}/{total}{marker}", progress.state)
}

fn output_label(output: &Option<std::path::PathBuf>) -> String {
    output
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "no archive".to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use scrape_core::JobReport;

    /// Replays queued events, then reports the engine as gone.
    #[derive(Default)]
    struct ScriptedEngine {
        events: RefCell<VecDeque<EngineEvent>>,
        started: RefCell<Vec<(JobId, String)>>,
    }

    impl Engine for ScriptedEngine {
        fn start(&self, job_id: JobId, layer_url: &str) {
            self.started.borrow_mut().push((job_id, layer_url.to_string()));
        }

        fn stop(&self, _job_id: JobId) {}

        fn recv_timeout(&self, _timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
            self.events
                .borrow_mut()
                .pop_front()
                .ok_or(RecvTimeoutError::Disconnected)
        }
    }

    #[test]
    fn dead_engine_fails_pending_jobs_instead_of_spinning() {
        let engine = ScriptedEngine::default();
        engine.events.borrow_mut().push_back(EngineEvent::JobCompleted {
            job_id: 1,
            result: Ok(JobReport {
                layer_name: "A".to_string(),
                done: 1,
                total: 1,
                failed: false,
                fail_message: None,
                output: None,
            }),
        });
        let urls = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let summary = run_layers(&engine, &urls, None);

        assert_eq!(
            summary,
            Summary {
                complete: 1,
                partial: 0,
                failed: 2,
            }
        );
        assert_eq!(engine.started.borrow().len(), 3);
    }

    fn progress(state: JobState, done: usize, total: usize, failed: bool) -> JobProgress {
        JobProgress {
            job_id: 1,
            state,
            progress: ProgressSnapshot {
                current: done,
                done,
                total,
                failed,
                fail_message: None,
            },
        }
    }

    #[test]
    fn progress_line_shows_state_and_counts() {
        let line = progress_line("https://x/0", &progress(JobState::Running, 2, 3, false));
        assert_eq!(line, format!("https://x/0: {} 2/3", JobState::Running));
    }

    #[test]
    fn progress_line_marks_failures() {
        let line = progress_line("u", &progress(JobState::Done, 2, 3, true));
        assert!(line.ends_with("2/3 (with failures)"));
    }

    #[test]
    fn summary_with_partial_jobs_is_not_complete() {
        let summary = Summary {
            complete: 2,
            partial: 1,
            failed: 0,
        };
        assert!(!summary.all_complete());
        assert!(Summary::default().all_complete());
    }
}
