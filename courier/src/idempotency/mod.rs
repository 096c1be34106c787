//! At-most-one processing per job id within a TTL window.
//!
//! A worker must win [`IdempotencyStore::claim`] for a job before invoking the
//! persistence sink. The claim is a single set-if-absent at the storage layer,
//! never a read followed by a write.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryIdempotencyStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisIdempotencyStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueResult;

/// Atomic claim markers with expiry.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Set `key` with `ttl` if it is absent.
    ///
    /// Returns `true` when this caller now holds the claim and `false` when
    /// someone else already does.
    async fn claim(&self, key: &str, ttl: Duration) -> QueueResult<bool>;

    /// Remove the marker for `key` so the next delivery can claim it.
    async fn release(&self, key: &str) -> QueueResult<()>;
}

/// Marker key for a job id, e.g. `idem:` + `a` = `idem:a`.
#[must_use]
pub fn claim_key(prefix: &str, job_id: &str) -> String {
    format!("{prefix}{job_id}")
}
