//! Shutdown flag and a pool of worker tasks sharing it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{Worker, WorkerStats};
use crate::error::{QueueResult, WorkerError};

/// Cooperative stop flag.
///
/// Cloning shares the flag. Once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    /// A flag that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this flag to stop after its current iteration.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Stops the rest of the pool if a worker task unwinds.
struct PanicGuard {
    shutdown: Shutdown,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shutdown.trigger();
        }
    }
}

/// Runs several [`Worker`]s on the Tokio runtime.
///
/// All workers spawned through the pool share its shutdown flag and stats.
/// When one worker fails the flag is triggered so the others drain and stop.
#[derive(Debug)]
pub struct WorkerPool {
    shutdown: Shutdown,
    stats: Arc<WorkerStats>,
    workers: Vec<(String, JoinHandle<QueueResult<()>>)>,
}

impl WorkerPool {
    /// An empty pool.
    #[must_use]
    pub fn new(shutdown: Shutdown, stats: Arc<WorkerStats>) -> Self {
        Self {
            shutdown,
            stats,
            workers: Vec::new(),
        }
    }

    /// Spawn `worker` with the pool's shutdown flag and stats.
    pub fn spawn(&mut self, worker: Worker) {
        let worker = worker
            .with_shutdown(self.shutdown.clone())
            .with_stats(Arc::clone(&self.stats));
        let name = worker.name().to_string();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let _guard = PanicGuard {
                shutdown: shutdown.clone(),
            };
            let result = worker.run().await;
            if result.is_err() {
                shutdown.trigger();
            }
            result
        });

        self.workers.push((name, handle));
    }

    /// Number of spawned workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no worker has been spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// The flag shared by every worker in the pool.
    #[must_use]
    pub const fn shutdown_handle(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Counters shared by every worker in the pool.
    #[must_use]
    pub const fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Request a stop and wait for every worker to finish.
    ///
    /// # Errors
    ///
    /// Returns the first worker failure, see [`join`](Self::join).
    pub async fn shutdown(self) -> Result<(), WorkerError> {
        info!(workers = self.workers.len(), "shutting down worker pool");
        self.shutdown.trigger();
        self.join().await
    }

    /// Wait for every worker to finish.
    ///
    /// Does not trigger shutdown by itself; workers run until the flag is set
    /// or one of them fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure observed, after every worker has stopped.
    pub async fn join(self) -> Result<(), WorkerError> {
        let mut first_error = None;

        for (worker, handle) in self.workers {
            let failure = match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(WorkerError::Queue {
                    worker: worker.clone(),
                    source,
                }),
                Err(join_error) => {
                    error!(worker = %worker, error = %join_error, "worker task failed");
                    Some(WorkerError::Panicked {
                        worker: worker.clone(),
                    })
                }
            };

            if let Some(failure) = failure {
                first_error.get_or_insert(failure);
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            completed = snapshot.completed,
            retried = snapshot.retried,
            dead_lettered = snapshot.dead_lettered,
            duplicates = snapshot.duplicates,
            "worker pool stopped"
        );

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::MemoryIdempotencyStore;
    use crate::queue::MemoryQueue;
    use crate::sink::LogSink;
    use crate::worker::WorkerSettings;
    use std::time::Duration;

    fn settings() -> WorkerSettings {
        WorkerSettings {
            dequeue_timeout: Duration::from_millis(20),
            ..WorkerSettings::default()
        }
    }

    fn pool_worker(name: &str, queue: &MemoryQueue) -> Worker {
        Worker::new(
            name,
            Arc::new(queue.clone()),
            Arc::new(MemoryIdempotencyStore::new()),
            Arc::new(LogSink),
            settings(),
        )
    }

    #[test]
    fn test_shutdown_is_shared_between_clones() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        assert!(!clone.is_triggered());
        shutdown.trigger();
        assert!(clone.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_workers() {
        let queue = MemoryQueue::new();
        let mut pool = WorkerPool::new(Shutdown::new(), Arc::new(WorkerStats::default()));
        pool.spawn(pool_worker("worker-0", &queue));
        pool.spawn(pool_worker("worker-1", &queue));
        assert_eq!(pool.len(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.shutdown().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_worker_stops_the_pool() {
        let queue = MemoryQueue::new();
        let shutdown = Shutdown::new();
        let mut pool = WorkerPool::new(shutdown.clone(), Arc::new(WorkerStats::default()));
        pool.spawn(pool_worker("worker-0", &queue));
        pool.spawn(pool_worker("worker-1", &queue));

        queue.push_raw(&settings().queue, "garbage");

        let err = pool.join().await.unwrap_err();
        assert!(matches!(err, WorkerError::Queue { .. }));
        assert!(shutdown.is_triggered());
    }
}
