//! Error types for the queue, the persistence sink and ingress.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the durable queue or the idempotency store.
///
/// These are transport-level or contract failures. The worker loop does not
/// recover from them; they propagate and end the worker.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The Redis backend failed (connection dropped, command rejected, ...).
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A job could not be serialized for storage.
    #[error("failed to serialize job: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record popped from a queue is not a valid job.
    #[error("malformed record on queue `{queue}`: {source}")]
    MalformedRecord {
        /// Queue the record was read from.
        queue: String,
        /// The raw record as stored.
        record: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by a [`PersistenceSink`](crate::sink::PersistenceSink).
///
/// Every variant is treated as a recoverable processing failure.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink rejected or failed to apply the effect.
    #[error("persistence failed: {0}")]
    Failed(String),

    /// The sink did not answer within the configured bound.
    #[error("persistence timed out after {0:?}")]
    Timeout(Duration),

    /// The Redis-backed sink failed.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors returned by [`Ingress::submit`](crate::ingress::Ingress::submit).
#[derive(Debug, Error)]
pub enum IngressError {
    /// A submission must name a job type.
    #[error("job type must not be empty")]
    EmptyJobType,

    /// Jobs need an attempt budget of at least one.
    #[error("max attempts must be positive")]
    InvalidMaxAttempts,

    /// The job could not be placed on the queue.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Why a worker loop stopped abnormally.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The loop hit a fatal queue or idempotency-store error.
    #[error("worker `{worker}` stopped: {source}")]
    Queue {
        /// Name of the worker loop.
        worker: String,
        /// Underlying failure.
        #[source]
        source: QueueError,
    },

    /// The loop panicked.
    #[error("worker `{worker}` panicked")]
    Panicked {
        /// Name of the worker loop.
        worker: String,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias for queue and idempotency-store operations.
pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_display_names_queue() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = QueueError::MalformedRecord {
            queue: "jobs".to_string(),
            record: "{".to_string(),
            source,
        };
        assert!(err.to_string().contains("`jobs`"));
    }

    #[test]
    fn test_ingress_error_is_transparent_over_queue_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let queue_error = QueueError::Serialization(source);
        let expected = queue_error.to_string();
        assert_eq!(IngressError::from(queue_error).to_string(), expected);
    }
}
