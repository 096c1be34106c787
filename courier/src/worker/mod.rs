//! The worker loop.
//!
//! Each iteration is a small state machine:
//!
//! 1. **Idle**: blocking dequeue, bounded by the dequeue timeout.
//! 2. **Claimed**: set-if-absent on `idem:<job id>`. A lost claim drops the job.
//! 3. **Processing**: call the persistence sink, bounded by the sink timeout.
//! 4. **Success**: nothing more to do.
//! 5. **Failure**: `attempts += 1`; an exhausted job goes to the dead-letter
//!    queue, anything else sleeps for its backoff and is requeued at the tail.
//!
//! A worker handles one job at a time, backoff sleep included. Throughput
//! scales with the number of workers, see [`WorkerPool`].
//!
//! Queue and idempotency-store errors are not handled here: they end
//! [`Worker::run`] and are expected to end the process.

mod pool;
mod stats;

pub use pool::{Shutdown, WorkerPool};
pub use stats::{StatsSnapshot, WorkerStats};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backoff::RetryPolicy;
use crate::config::CourierConfig;
use crate::error::{QueueResult, SinkError};
use crate::idempotency::{claim_key, IdempotencyStore};
use crate::job::Job;
use crate::queue::DurableQueue;
use crate::sink::PersistenceSink;

/// What a single iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The dequeue timed out with nothing to do.
    Idle,
    /// Another worker already holds the claim; the job was dropped.
    Duplicate,
    /// The sink accepted the job.
    Completed,
    /// The sink failed and the job went back on the primary queue.
    Retried {
        /// Attempt count after the failure.
        attempts: u32,
        /// Backoff paid before requeueing.
        delay: Duration,
    },
    /// The sink failed for the last time and the job went to the dead-letter queue.
    DeadLettered {
        /// Attempt count after the failure.
        attempts: u32,
    },
}

/// Queue names, timeouts and policy a worker runs with.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Primary queue.
    pub queue: String,
    /// Dead-letter queue.
    pub dead_letter: String,
    /// Blocking dequeue bound.
    pub dequeue_timeout: Duration,
    /// Prefix for claim markers.
    pub claim_prefix: String,
    /// Claim marker lifetime.
    pub claim_ttl: Duration,
    /// Bound on a single sink call.
    pub sink_timeout: Duration,
    /// Backoff schedule.
    pub policy: RetryPolicy,
}

impl WorkerSettings {
    /// Settings taken from loaded configuration.
    #[must_use]
    pub fn from_config(config: &CourierConfig) -> Self {
        Self {
            queue: config.queue.name.clone(),
            dead_letter: config.queue.dead_letter.clone(),
            dequeue_timeout: config.queue.dequeue_timeout(),
            claim_prefix: config.idempotency.key_prefix.clone(),
            claim_ttl: config.idempotency.ttl(),
            sink_timeout: config.worker.sink_timeout(),
            policy: config.retry,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&CourierConfig::default())
    }
}

/// A single worker loop.
pub struct Worker {
    name: String,
    queue: Arc<dyn DurableQueue>,
    idempotency: Arc<dyn IdempotencyStore>,
    sink: Arc<dyn PersistenceSink>,
    settings: WorkerSettings,
    shutdown: Shutdown,
    stats: Arc<WorkerStats>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Create a worker with its own shutdown flag and stats.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn DurableQueue>,
        idempotency: Arc<dyn IdempotencyStore>,
        sink: Arc<dyn PersistenceSink>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            idempotency,
            sink,
            settings,
            shutdown: Shutdown::new(),
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Share a shutdown flag with other workers.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Share counters with other workers.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<WorkerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Name passed to the sink and used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The flag that stops this worker.
    #[must_use]
    pub const fn shutdown_handle(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Counters this worker updates.
    #[must_use]
    pub const fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Loop until shutdown is requested.
    ///
    /// The flag is checked before every dequeue, so a stop request takes
    /// effect once the current dequeue (and any job it returned) resolves.
    ///
    /// # Errors
    ///
    /// Returns the first queue or idempotency-store error. Sink failures are
    /// retried and never surface here.
    pub async fn run(&self) -> QueueResult<()> {
        info!(
            worker = %self.name,
            queue = %self.settings.queue,
            dead_letter = %self.settings.dead_letter,
            "worker started"
        );

        while !self.shutdown.is_triggered() {
            if let Err(err) = self.process_one().await {
                error!(worker = %self.name, error = %err, "worker stopping on queue error");
                return Err(err);
            }
        }

        info!(worker = %self.name, "worker stopped");
        Ok(())
    }

    /// Run one iteration: dequeue, claim, process, and retry or dead-letter.
    ///
    /// # Errors
    ///
    /// Returns queue and idempotency-store errors, including malformed records.
    pub async fn process_one(&self) -> QueueResult<Outcome> {
        let Some(job) = self
            .queue
            .dequeue(&self.settings.queue, self.settings.dequeue_timeout)
            .await?
        else {
            return Ok(Outcome::Idle);
        };

        let key = claim_key(&self.settings.claim_prefix, &job.id);
        if !self.idempotency.claim(&key, self.settings.claim_ttl).await? {
            debug!(worker = %self.name, job_id = %job.id, "already claimed, skipping");
            self.stats.record_duplicate();
            return Ok(Outcome::Duplicate);
        }

        debug!(
            worker = %self.name,
            job_id = %job.id,
            job_type = %job.job_type,
            attempts = job.attempts,
            "processing job"
        );

        match self.persist(&job).await {
            Ok(()) => {
                info!(worker = %self.name, job_id = %job.id, job_type = %job.job_type, "job completed");
                self.stats.record_completed();
                Ok(Outcome::Completed)
            }
            Err(err) => self.fail(job, &key, &err).await,
        }
    }

    async fn persist(&self, job: &Job) -> Result<(), SinkError> {
        let call = self
            .sink
            .persist(&job.id, &self.name, &job.job_type, &job.payload);

        tokio::time::timeout(self.settings.sink_timeout, call)
            .await
            .unwrap_or(Err(SinkError::Timeout(self.settings.sink_timeout)))
    }

    async fn fail(&self, mut job: Job, key: &str, err: &SinkError) -> QueueResult<Outcome> {
        let attempts = job.record_failure(err.to_string());

        // Exhaustion is decided before any backoff is computed.
        if job.is_exhausted() {
            self.idempotency.release(key).await?;
            self.queue.enqueue(&self.settings.dead_letter, &job).await?;

            warn!(
                worker = %self.name,
                job_id = %job.id,
                job_type = %job.job_type,
                attempts,
                error = %err,
                dead_letter = %self.settings.dead_letter,
                "job exhausted its attempts, dead-lettered"
            );
            self.stats.record_dead_lettered();
            return Ok(Outcome::DeadLettered { attempts });
        }

        let delay = self.settings.policy.next_delay(attempts);
        warn!(
            worker = %self.name,
            job_id = %job.id,
            attempts,
            max_attempts = job.max_attempts,
            delay_ms = self.settings.policy.next_delay_ms(attempts),
            error = %err,
            "job failed, retrying after backoff"
        );

        tokio::time::sleep(delay).await;

        // The marker must be gone before the job is visible again, otherwise
        // the next delivery would be skipped as a duplicate.
        self.idempotency.release(key).await?;
        self.queue.requeue(&self.settings.queue, &job).await?;

        self.stats.record_retried();
        Ok(Outcome::Retried { attempts, delay })
    }
}
