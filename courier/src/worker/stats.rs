//! Counters shared by the worker loops of one process.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Outcome counters, updated lock-free by every worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    completed: AtomicU64,
    duplicates: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Jobs the sink accepted.
    pub completed: u64,
    /// Deliveries dropped because the claim was already held.
    pub duplicates: u64,
    /// Failures that were requeued.
    pub retried: u64,
    /// Jobs moved to the dead-letter queue.
    pub dead_lettered: u64,
}

impl WorkerStats {
    /// A job the sink accepted.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A delivery dropped because its claim was held.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// A failure that was requeued.
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// A job moved to the dead-letter queue.
    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}
