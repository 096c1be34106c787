//! Worker service for courier.
//!
//! Runs a pool of worker loops against Redis and stores job results in
//! per-type Redis hashes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod services;

pub use config::WorkerServiceConfig;
pub use services::{RedisResultSink, ResultRecord};
