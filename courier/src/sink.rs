//! The effect performed when a job is processed successfully.
//!
//! The core only depends on the success/failure contract: `Ok` means the
//! effect is done, any error means the job should be retried. A sink is not
//! transactionally tied to queue state.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::error::SinkError;

/// Storage effect invoked once per claimed job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Apply the effect for one job.
    ///
    /// # Errors
    ///
    /// Any error is treated as a transient failure and retried with backoff.
    async fn persist(
        &self,
        job_id: &str,
        worker: &str,
        job_type: &str,
        payload: &Value,
    ) -> Result<(), SinkError>;
}

/// Sink that only logs what it would have stored.
///
/// Useful for dry runs and for exercising a deployment end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl PersistenceSink for LogSink {
    async fn persist(
        &self,
        job_id: &str,
        worker: &str,
        job_type: &str,
        payload: &Value,
    ) -> Result<(), SinkError> {
        info!(job_id, worker, job_type, %payload, "persisted job");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        let result = LogSink.persist("a", "worker-0", "t", &json!({})).await;
        assert!(result.is_ok());
    }
}
