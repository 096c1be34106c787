//! Stores job results in Redis hashes, one hash per job type.
//!
//! `HSET <prefix>:<job type> <job id> <record>` is idempotent per job id, so
//! a duplicate delivery after the claim marker expires overwrites the same
//! field instead of adding a second result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier::{PersistenceSink, SinkError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// The value stored for one processed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Worker that processed the job.
    pub worker: String,
    /// The job payload as received.
    pub payload: Value,
    /// When the sink stored the record.
    pub processed_at: DateTime<Utc>,
}

/// [`PersistenceSink`] writing [`ResultRecord`]s to Redis.
#[derive(Clone)]
pub struct RedisResultSink {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisResultSink")
            .field("conn", &"<ConnectionManager>")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisResultSink {
    /// Create a sink writing under `key_prefix`.
    #[must_use]
    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Hash holding results for `job_type`.
    #[must_use]
    pub fn hash_key(&self, job_type: &str) -> String {
        result_key(&self.key_prefix, job_type)
    }
}

fn result_key(prefix: &str, job_type: &str) -> String {
    format!("{prefix}:{job_type}")
}

#[async_trait]
impl PersistenceSink for RedisResultSink {
    async fn persist(
        &self,
        job_id: &str,
        worker: &str,
        job_type: &str,
        payload: &Value,
    ) -> Result<(), SinkError> {
        let key = self.hash_key(job_type);
        let record = ResultRecord {
            worker: worker.to_string(),
            payload: payload.clone(),
            processed_at: Utc::now(),
        };
        let value = serde_json::to_string(&record).map_err(|e| SinkError::Failed(e.to_string()))?;

        let mut conn = self.conn.clone();
        let _: i64 = conn.hset(&key, job_id, value).await.map_err(|e| {
            error!(error = %e, key = %key, job_id, "HSET failed");
            e
        })?;

        debug!(key = %key, job_id, worker, "stored job result");
        Ok(())
    }
}
