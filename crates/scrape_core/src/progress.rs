use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Point-in-time copy of a job's counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Next persist index to be handed out.
    pub current: usize,
    /// Batches completed successfully.
    pub done: usize,
    /// Batches dispatched for the job.
    pub total: usize,
    pub failed: bool,
    pub fail_message: Option<String>,
}

/// Counters and sticky failure state shared by every batch of one job.
///
/// All operations are lock-free, so unrelated batches never serialize on
/// each other. `failed` is never reset and only the first failure message is
/// kept.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    current: AtomicUsize,
    done: AtomicUsize,
    total: OnceLock<usize>,
    failed: AtomicBool,
    fail_message: OnceLock<String>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the batch count. Returns false if it was already fixed.
    pub fn fix_total(&self, total: usize) -> bool {
        self.total.set(total).is_ok()
    }

    pub fn total(&self) -> usize {
        self.total.get().copied().unwrap_or(0)
    }

    /// Hands out the next artifact index. Indices are unique but carry no
    /// relation to batch order.
    pub fn next_persist_index(&self) -> usize {
        self.current.fetch_add(1, Ordering::Relaxed)
    }

    /// Counts one completed batch. `done` saturates at `total`; returns false
    /// when the increment was refused.
    pub fn record_success(&self) -> bool {
        let total = self.total();
        self.done
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                (done < total).then_some(done + 1)
            })
            .is_ok()
    }

    /// Marks the job failed. The first message recorded wins.
    pub fn record_failure(&self, message: impl Into<String>) {
        let _ = self.fail_message.set(message.into());
        self.failed.store(true, Ordering::Release);
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn fail_message(&self) -> Option<&str> {
        self.fail_message.get().map(String::as_str)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let failed = self.is_failed();
        ProgressSnapshot {
            current: self.current.load(Ordering::Relaxed),
            done: self.done(),
            total: self.total(),
            failed,
            fail_message: self.fail_message().map(ToOwned::to_owned),
        }
    }
}
