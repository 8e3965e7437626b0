use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Created,
    EnumeratingIds,
    Running,
    Converting,
    Archiving,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Created => "created",
            JobState::EnumeratingIds => "enumerating ids",
            JobState::Running => "running",
            JobState::Converting => "converting",
            JobState::Archiving => "archiving",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Events that drive a job through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMsg {
    /// Job start requested.
    Start,
    /// Ids enumerated and batches produced.
    BatchesReady,
    /// Every dispatched batch settled.
    BatchesSettled,
    /// Conversion attempted, successfully or not.
    ConversionFinished,
    /// Archive step finished.
    Archived,
    /// Unrecoverable error.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} on {msg:?}")]
pub struct TransitionError {
    pub from: JobState,
    pub msg: LifecycleMsg,
}

/// Pure transition function: applies a message to a state.
///
/// `Fatal` moves any non-terminal state to `Failed`. Terminal states accept
/// nothing.
pub fn advance(state: JobState, msg: LifecycleMsg) -> Result<JobState, TransitionError> {
    let next = match (state, msg) {
        (JobState::Done | JobState::Failed, _) => None,
        (_, LifecycleMsg::Fatal) => Some(JobState::Failed),
        (JobState::Created, LifecycleMsg::Start) => Some(JobState::EnumeratingIds),
        (JobState::EnumeratingIds, LifecycleMsg::BatchesReady) => Some(JobState::Running),
        (JobState::Running, LifecycleMsg::BatchesSettled) => Some(JobState::Converting),
        (JobState::Converting, LifecycleMsg::ConversionFinished) => Some(JobState::Archiving),
        (JobState::Archiving, LifecycleMsg::Archived) => Some(JobState::Done),
        _ => None,
    };
    next.ok_or(TransitionError { from: state, msg })
}
