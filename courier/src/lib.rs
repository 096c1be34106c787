//! Durable background job processing.
//!
//! Jobs are submitted through [`Ingress`], stored on a FIFO [`DurableQueue`]
//! and picked up by any number of competing [`Worker`]s. Before a worker calls
//! the [`PersistenceSink`] it must win an atomic claim in the
//! [`IdempotencyStore`], so a job id is processed at most once per claim
//! window. Failures are retried with capped exponential backoff
//! ([`RetryPolicy`]) until the job's attempt budget runs out, at which point
//! it is moved to the dead-letter queue ([`DeadLetters`]).
//!
//! Redis implementations of the queue and the store are behind the `redis`
//! feature (on by default); in-memory implementations are always available.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod idempotency;
pub mod ingress;
pub mod job;
pub mod queue;
pub mod sink;
pub mod worker;

pub use backoff::RetryPolicy;
pub use config::CourierConfig;
pub use dead_letter::DeadLetters;
pub use error::{ConfigError, IngressError, QueueError, QueueResult, SinkError, WorkerError};
pub use idempotency::{IdempotencyStore, MemoryIdempotencyStore};
pub use ingress::{Ingress, Submission};
pub use job::Job;
pub use queue::{DurableQueue, MemoryQueue};
pub use sink::{LogSink, PersistenceSink};
pub use worker::{Outcome, Shutdown, StatsSnapshot, Worker, WorkerPool, WorkerSettings, WorkerStats};

#[cfg(feature = "redis")]
pub use idempotency::RedisIdempotencyStore;
#[cfg(feature = "redis")]
pub use queue::RedisQueue;
