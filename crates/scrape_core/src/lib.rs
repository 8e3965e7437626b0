//! Scrape core: id batching, shared progress and the job lifecycle state machine.
mod chunk;
mod lifecycle;
mod progress;
mod status;

pub use chunk::{IdBatch, IdChunker, ObjectId, CHUNK_SIZE, ID_FIELD};
pub use lifecycle::{advance, JobState, LifecycleMsg, TransitionError};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use status::{JobReport, JobStatus};
