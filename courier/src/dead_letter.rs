//! Operator access to the dead-letter queue.
//!
//! Jobs only land here after exhausting their attempts. Nothing in the worker
//! loop reads the dead-letter queue; it is drained by hand through
//! [`DeadLetters::replay`] or [`DeadLetters::purge`].

use std::sync::Arc;

use tracing::info;

use crate::config::CourierConfig;
use crate::error::QueueResult;
use crate::idempotency::{claim_key, IdempotencyStore};
use crate::job::Job;
use crate::queue::DurableQueue;

/// Inspect, replay and purge dead-lettered jobs.
pub struct DeadLetters {
    queue: Arc<dyn DurableQueue>,
    idempotency: Arc<dyn IdempotencyStore>,
    primary: String,
    dead_letter: String,
    claim_prefix: String,
}

impl std::fmt::Debug for DeadLetters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetters")
            .field("primary", &self.primary)
            .field("dead_letter", &self.dead_letter)
            .field("claim_prefix", &self.claim_prefix)
            .finish_non_exhaustive()
    }
}

impl DeadLetters {
    /// Bind to the queues and claim prefix named in `config`.
    #[must_use]
    pub fn new(
        queue: Arc<dyn DurableQueue>,
        idempotency: Arc<dyn IdempotencyStore>,
        config: &CourierConfig,
    ) -> Self {
        Self {
            queue,
            idempotency,
            primary: config.queue.name.clone(),
            dead_letter: config.queue.dead_letter.clone(),
            claim_prefix: config.idempotency.key_prefix.clone(),
        }
    }

    /// Up to `limit` jobs from the head of the dead-letter queue, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the queue cannot be read or holds a malformed record.
    pub async fn list(&self, limit: usize) -> QueueResult<Vec<Job>> {
        self.queue.peek(&self.dead_letter, limit).await
    }

    /// Number of dead-lettered jobs.
    ///
    /// # Errors
    ///
    /// Returns error if the queue cannot be read.
    pub async fn count(&self) -> QueueResult<usize> {
        self.queue.len(&self.dead_letter).await
    }

    /// Move up to `max` jobs back onto the primary queue with a fresh
    /// attempt budget. Returns the replayed jobs.
    ///
    /// At most the number of jobs held when the call starts are moved, so
    /// jobs that fail again and land back here during the replay are left for
    /// the next one.
    ///
    /// The claim marker is released before the job is enqueued; a replayed
    /// job would otherwise be dropped as a duplicate until the marker expired.
    ///
    /// # Errors
    ///
    /// Returns error on the first queue or store failure. Jobs replayed
    /// before the failure stay on the primary queue.
    pub async fn replay(&self, max: usize) -> QueueResult<Vec<Job>> {
        let limit = max.min(self.count().await?);
        let mut replayed = Vec::with_capacity(limit);

        while replayed.len() < limit {
            let Some(mut job) = self.queue.pop(&self.dead_letter).await? else {
                break;
            };

            job.reset_attempts();
            self.idempotency
                .release(&claim_key(&self.claim_prefix, &job.id))
                .await?;
            self.queue.enqueue(&self.primary, &job).await?;

            info!(job_id = %job.id, job_type = %job.job_type, queue = %self.primary, "replayed dead-lettered job");
            replayed.push(job);
        }

        Ok(replayed)
    }

    /// Drop every dead-lettered job. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the queue cannot be cleared.
    pub async fn purge(&self) -> QueueResult<usize> {
        let removed = self.queue.purge(&self.dead_letter).await?;
        info!(queue = %self.dead_letter, removed, "purged dead-letter queue");
        Ok(removed)
    }
}
