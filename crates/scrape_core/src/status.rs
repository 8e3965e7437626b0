use std::path::PathBuf;

use crate::{JobState, ProgressSnapshot};

/// Consistent view of a job, taken at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobStatus {
    pub layer_name: Option<String>,
    pub state: JobState,
    pub progress: ProgressSnapshot,
    /// Archive path; only set once the job is done.
    pub output: Option<PathBuf>,
}

impl JobStatus {
    /// Done does not imply success; check `is_failed` as well.
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }

    pub fn is_failed(&self) -> bool {
        self.progress.failed || self.state == JobState::Failed
    }

    pub fn fail_message(&self) -> Option<&str> {
        self.progress.fail_message.as_deref()
    }
}

/// Final, immutable result of a job that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub layer_name: String,
    pub done: usize,
    pub total: usize,
    pub failed: bool,
    pub fail_message: Option<String>,
    pub output: Option<PathBuf>,
}

impl JobReport {
    pub fn is_complete(&self) -> bool {
        !self.failed && self.done == self.total
    }
}
