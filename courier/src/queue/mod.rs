//! Durable FIFO queues.
//!
//! A queue is an ordered list of serialized [`Job`]s identified by name. Jobs
//! are appended at the tail and popped from the head, so every record is
//! delivered to exactly one popper. The dead-letter queue is a second queue of
//! the same shape.
//!
//! There is no acknowledgement step: once [`DurableQueue::dequeue`] returns a
//! job, the queue no longer holds it. A worker that dies before completing or
//! requeueing the job loses it.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryQueue;
#[cfg(feature = "redis")]
pub use self::redis::RedisQueue;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{QueueError, QueueResult};
use crate::job::Job;

/// Named FIFO queues with blocking pop.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Serialize `job` and append it to the tail of `queue`.
    async fn enqueue(&self, queue: &str, job: &Job) -> QueueResult<()>;

    /// Pop the head of `queue`, waiting up to `timeout` for a record.
    ///
    /// Returns `Ok(None)` when the wait elapses. A record that does not decode
    /// as a [`Job`] is a [`QueueError::MalformedRecord`].
    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>>;

    /// Put a job back at the tail of `queue`.
    async fn requeue(&self, queue: &str, job: &Job) -> QueueResult<()> {
        self.enqueue(queue, job).await
    }

    /// Pop the head of `queue` without waiting.
    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>>;

    /// Number of records held by `queue`.
    async fn len(&self, queue: &str) -> QueueResult<usize>;

    /// Read up to `limit` records from the head of `queue` without removing them.
    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<Job>>;

    /// Drop every record in `queue`, returning how many were removed.
    async fn purge(&self, queue: &str) -> QueueResult<usize>;
}

pub(crate) fn encode(job: &Job) -> QueueResult<String> {
    Ok(serde_json::to_string(job)?)
}

pub(crate) fn decode(queue: &str, record: String) -> QueueResult<Job> {
    serde_json::from_str(&record).map_err(|source| QueueError::MalformedRecord {
        queue: queue.to_string(),
        record,
        source,
    })
}
