//! Job submission.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::IngressError;
use crate::job::Job;
use crate::queue::DurableQueue;

/// A request to run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Job type name.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Structured payload.
    #[serde(default)]
    pub payload: Value,
    /// Caller-chosen key; becomes the job id so resubmissions dedupe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Submission {
    /// Create a submission without an idempotency key.
    #[must_use]
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Builds jobs from submissions and places them on the primary queue.
#[derive(Clone)]
pub struct Ingress {
    queue: Arc<dyn DurableQueue>,
    queue_name: String,
    max_attempts: u32,
}

impl std::fmt::Debug for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingress")
            .field("queue_name", &self.queue_name)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Ingress {
    /// Create an ingress that stamps `max_attempts` on every job.
    #[must_use]
    pub fn new(queue: Arc<dyn DurableQueue>, queue_name: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            max_attempts,
        }
    }

    /// Accept a submission and enqueue the resulting job.
    ///
    /// The idempotency key, when present and non-empty, is used as the job id;
    /// otherwise a random UUID is generated.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::EmptyJobType`] for a blank job type,
    /// [`IngressError::InvalidMaxAttempts`] when this ingress was built with a
    /// zero attempt budget and [`IngressError::Queue`] when the queue rejects
    /// the push.
    pub async fn submit(&self, submission: Submission) -> Result<Job, IngressError> {
        if submission.job_type.trim().is_empty() {
            return Err(IngressError::EmptyJobType);
        }
        if self.max_attempts == 0 {
            return Err(IngressError::InvalidMaxAttempts);
        }

        let id = submission
            .idempotency_key
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let job = Job::new(id, submission.job_type, submission.payload, self.max_attempts);
        self.queue.enqueue(&self.queue_name, &job).await?;

        info!(job_id = %job.id, job_type = %job.job_type, queue = %self.queue_name, "job submitted");
        Ok(job)
    }
}
