//! Redis-backed queue.
//!
//! Each queue is a Redis list: `RPUSH` appends to the tail and `BLPOP` pops
//! the head, which gives FIFO order and single delivery across any number of
//! competing workers.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error};

use super::{decode, encode, DurableQueue};
use crate::error::QueueResult;
use crate::job::Job;

/// [`DurableQueue`] over Redis lists.
///
/// A blocking pop occupies the connection until it resolves, so give every
/// worker loop its own `RedisQueue` rather than sharing one.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisQueue {
    /// Wrap an existing connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a dedicated connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    fn seconds(timeout: Duration) -> f64 {
        // BLPOP treats 0 as "wait forever"
        timeout.as_secs_f64().max(0.001)
    }
}

#[async_trait]
impl DurableQueue for RedisQueue {
    async fn enqueue(&self, queue: &str, job: &Job) -> QueueResult<()> {
        let record = encode(job)?;
        let mut conn = self.conn.clone();

        let length: i64 = conn.rpush(queue, &record).await.map_err(|e| {
            error!(error = %e, queue, job_id = %job.id, "RPUSH failed");
            e
        })?;

        debug!(queue, job_id = %job.id, length, "RPUSH");
        Ok(())
    }

    async fn dequeue(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>> {
        let mut conn = self.conn.clone();

        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(queue)
            .arg(Self::seconds(timeout))
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(error = %e, queue, "BLPOP failed");
                e
            })?;

        popped
            .map(|(_key, record)| decode(queue, record))
            .transpose()
    }

    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let record: Option<String> = redis::cmd("LPOP")
            .arg(queue)
            .query_async(&mut conn)
            .await?;

        record.map(|record| decode(queue, record)).transpose()
    }

    async fn len(&self, queue: &str) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let length: usize = conn.llen(queue).await?;
        Ok(length)
    }

    async fn peek(&self, queue: &str, limit: usize) -> QueueResult<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let records: Vec<String> = conn.lrange(queue, 0, stop).await?;

        records
            .into_iter()
            .map(|record| decode(queue, record))
            .collect()
    }

    async fn purge(&self, queue: &str) -> QueueResult<usize> {
        let mut conn = self.conn.clone();

        // LLEN and DEL in one MULTI so pushes in between are not lost from the count
        let (length, _deleted): (usize, i64) = redis::pipe()
            .atomic()
            .llen(queue)
            .del(queue)
            .query_async(&mut conn)
            .await?;

        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_timeout_never_zero() {
        assert!(RedisQueue::seconds(Duration::ZERO) > 0.0);
        assert!((RedisQueue::seconds(Duration::from_millis(1500)) - 1.5).abs() < f64::EPSILON);
    }
}
