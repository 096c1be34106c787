//! In-process queue backend.
//!
//! Holds serialized records exactly like the Redis backend does, so decoding
//! failures surface the same way. Suitable for tests and single-process
//! deployments; nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{decode, encode, DurableQueue};
use crate::error::QueueResult;
use crate::job::Job;

/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// In-memory [`DurableQueue`].
///
/// Cloning shares the underlying queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
    pushed: Arc<Notify>,
}

impl MemoryQueue {
    /// Create an empty set of queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record, bypassing serialization.
    ///
    /// Lets callers simulate producers that speak a different record format.
    pub fn push_raw(&self, queue: &str, record: impl Into<String>) {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(record.into());
        self.pushed.notify_waiters();
    }

    fn pop_raw(&self, queue: &str) -> Option<String> {
        self.queues.lock().get_mut(queue).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl DurableQueue for MemoryQueue {
    async fn enqueue(&self, queue: &str, job: &Job) -> QueueResult<()> {
        let record = encode(job)?;
        self.push_raw(queue, record);
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>> {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            // Register interest before checking so a push between the check
            // and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.pop_raw(queue) {
                return decode(queue, record).map(Some);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>> {
        self.pop_raw(queue)
            .map(|record| decode(queue, record))
            .transpose()
    }

    async fn len(&self, queue: &str) -> QueueResult<usize> {
        Ok(self.queues.lock().get(queue).map_or(0, VecDeque::len))
    }

    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<Job>> {
        let records: Vec<String> = self
            .queues
            .lock()
            .get(queue)
            .map(|q| q.iter().take(limit).cloned().collect())
            .unwrap_or_default();

        records
            .into_iter()
            .map(|record| decode(queue, record))
            .collect()
    }

    async fn purge(&self, queue: &str) -> QueueResult<usize> {
        Ok(self.queues.lock().remove(queue).map_or(0, |q| q.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use serde_json::json;

    fn job(id: &str) -> Job {
        Job::new(id, "t", json!({}), 3)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryQueue::new();
        queue.enqueue("jobs", &job("j1")).await.unwrap();
        queue.enqueue("jobs", &job("j2")).await.unwrap();

        let first = queue.dequeue("jobs", Duration::from_millis(10)).await.unwrap();
        let second = queue.dequeue("jobs", Duration::from_millis(10)).await.unwrap();

        assert_eq!(first.unwrap().id, "j1");
        assert_eq!(second.unwrap().id, "j2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_with_none() {
        let queue = MemoryQueue::new();
        let started = Instant::now();

        let result = queue.dequeue("jobs", Duration::from_secs(1)).await.unwrap();

        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_wakes_on_push() {
        let queue = MemoryQueue::new();
        let producer = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            producer.enqueue("jobs", &job("late")).await.unwrap();
        });

        let result = queue.dequeue("jobs", Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.unwrap().id, "late");
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let queue = MemoryQueue::new();
        queue.enqueue("jobs", &job("a")).await.unwrap();

        let result = queue.dequeue("jobs", Duration::MAX).await.unwrap();
        assert_eq!(result.unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = MemoryQueue::new();
        queue.enqueue("jobs", &job("a")).await.unwrap();

        assert_eq!(queue.len("jobs").await.unwrap(), 1);
        assert_eq!(queue.len("jobs:dead").await.unwrap(), 0);
        assert!(queue.pop("jobs:dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_record_is_an_error() {
        let queue = MemoryQueue::new();
        queue.push_raw("jobs", "{\"id\":");

        let err = queue
            .dequeue("jobs", Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::MalformedRecord { .. }));
    }

    #[tokio::test]
    async fn test_peek_and_purge() {
        let queue = MemoryQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue("jobs", &job(id)).await.unwrap();
        }

        let peeked = queue.peek("jobs", 2).await.unwrap();
        assert_eq!(
            peeked.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(),
            ["a", "b"]
        );
        assert_eq!(queue.len("jobs").await.unwrap(), 3);

        assert_eq!(queue.purge("jobs").await.unwrap(), 3);
        assert_eq!(queue.len("jobs").await.unwrap(), 0);
    }
}
