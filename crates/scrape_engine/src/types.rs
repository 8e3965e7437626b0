use std::fmt;

use scrape_core::{JobReport, JobState, ProgressSnapshot, TransitionError};

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: ProgressSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted {
        job_id: JobId,
        result: Result<JobReport, JobError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Category used in the job's failure message.
    pub fn category(&self) -> &'static str {
        match self.kind {
            FailureKind::MalformedResponse | FailureKind::MissingField(_) => "parse",
            _ => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    MalformedResponse,
    MissingField(&'static str),
    /// Error object returned by the service inside a success response.
    ServiceError { code: i64 },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::MissingField(field) => write!(f, "missing field `{field}`"),
            FailureKind::ServiceError { code } => write!(f, "service error {code}"),
        }
    }
}

/// Errors that end a job before it can produce output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("enumeration failed: {0}")]
    Enumeration(FetchError),
    #[error("output unavailable: {0}")]
    Output(String),
    #[error("job stopped")]
    Stopped,
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}
