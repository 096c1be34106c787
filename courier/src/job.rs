//! The job record carried through the queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of asynchronous work.
///
/// Created by [`Ingress`](crate::ingress::Ingress), owned by whichever queue
/// holds it, and mutated only by the worker loop (attempt increments).
/// `attempts < max_attempts` holds everywhere except on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Opaque, unique identifier. Also the idempotency key.
    pub id: String,
    /// Job type name, passed through to the persistence sink.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Structured payload.
    pub payload: Value,
    /// Number of failed processing attempts so far.
    pub attempts: u32,
    /// Attempt budget; reaching it routes the job to the dead-letter queue.
    pub max_attempts: u32,
    /// When ingress created the job.
    pub created_at: DateTime<Utc>,
    /// Message of the most recent processing failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    /// Create a fresh job with no attempts recorded.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        job_type: impl Into<String>,
        payload: Value,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    /// Record a failed attempt and return the post-increment count.
    pub fn record_failure(&mut self, error: impl Into<String>) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
        self.attempts
    }

    /// Whether the attempt budget is used up.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Reset the attempt counter, as done when replaying from the dead-letter queue.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }
}
