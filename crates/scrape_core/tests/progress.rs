use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use scrape_core::{ProgressSnapshot, ProgressTracker};

#[test]
fn first_failure_message_wins() {
    let tracker = ProgressTracker::new();
    assert!(!tracker.is_failed());
    assert_eq!(tracker.fail_message(), None);

    tracker.record_failure("transport: http status 500");
    tracker.record_failure("parse: unexpected end of input");

    assert!(tracker.is_failed());
    assert_eq!(tracker.fail_message(), Some("transport: http status 500"));
}

#[test]
fn total_is_fixed_once() {
    let tracker = ProgressTracker::new();
    assert!(tracker.fix_total(3));
    assert!(!tracker.fix_total(10));
    assert_eq!(tracker.total(), 3);
}

#[test]
fn done_never_exceeds_total() {
    let tracker = ProgressTracker::new();
    tracker.fix_total(2);

    assert!(tracker.record_success());
    assert!(tracker.record_success());
    assert!(!tracker.record_success());
    assert_eq!(tracker.done(), 2);
}

#[test]
fn persist_indices_are_unique_and_sequential() {
    let tracker = ProgressTracker::new();
    let indices: Vec<_> = (0..4).map(|_| tracker.next_persist_index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[test]
fn snapshot_reports_all_counters() {
    let tracker = ProgressTracker::new();
    tracker.fix_total(3);
    tracker.next_persist_index();
    tracker.record_success();
    tracker.record_failure("persist: disk full");

    assert_eq!(
        tracker.snapshot(),
        ProgressSnapshot {
            current: 1,
            done: 1,
            total: 3,
            failed: true,
            fail_message: Some("persist: disk full".to_string()),
        }
    );
}

#[test]
fn concurrent_mixed_completions_lose_no_updates() {
    const WORKERS: usize = 16;
    const PER_WORKER: usize = 250;

    let tracker = Arc::new(ProgressTracker::new());
    tracker.fix_total(WORKERS * PER_WORKER);

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let mut successes = 0;
                for i in 0..PER_WORKER {
                    if (worker + i) % 3 == 0 {
                        tracker.record_failure(format!("worker {worker} batch {i}"));
                    } else {
                        tracker.next_persist_index();
                        tracker.record_success();
                        successes += 1;
                    }
                    let snap = tracker.snapshot();
                    assert!(snap.done <= snap.total);
                }
                successes
            })
        })
        .collect();

    let expected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let snap = tracker.snapshot();
    assert_eq!(snap.done, expected);
    assert_eq!(snap.current, expected);
    assert!(snap.failed);
    assert!(snap.fail_message.is_some());
}
