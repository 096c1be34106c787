//! Configuration shared by the worker service and the CLI.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use tracing::warn;

use crate::backoff::RetryPolicy;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierConfig {
    /// Redis connection.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Queue names and polling.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Retry budget and backoff.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Claim markers.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Worker loops.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Result storage.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
}

/// Queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Primary queue name.
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Dead-letter queue name. Must differ from `name`.
    #[serde(default = "default_dead_letter")]
    pub dead_letter: String,
    /// Longest a blocking dequeue waits before the loop re-checks shutdown.
    #[serde(default = "default_dequeue_timeout")]
    pub dequeue_timeout_seconds: u64,
}

/// Idempotency configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    /// Prefix prepended to the job id to form the marker key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Marker lifetime in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Base name; loops are named `<name>-<index>`.
    #[serde(default = "default_worker_name")]
    pub name: String,
    /// Independent worker loops to run in this process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound on a single sink call.
    #[serde(default = "default_sink_timeout")]
    pub sink_timeout_seconds: u64,
}

/// Result sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Prefix for the per-type result hashes.
    #[serde(default = "default_sink_prefix")]
    pub key_prefix: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_queue_name() -> String {
    "jobs".to_string()
}

fn default_dead_letter() -> String {
    "jobs:dead".to_string()
}

const fn default_dequeue_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "idem:".to_string()
}

const fn default_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_worker_name() -> String {
    "worker".to_string()
}

const fn default_concurrency() -> usize {
    1
}

const fn default_sink_timeout() -> u64 {
    30
}

fn default_sink_prefix() -> String {
    "results".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            dead_letter: default_dead_letter(),
            dequeue_timeout_seconds: default_dequeue_timeout(),
        }
    }
}

impl QueueConfig {
    /// Blocking dequeue bound.
    #[must_use]
    pub const fn dequeue_timeout(&self) -> Duration {
        Duration::from_secs(self.dequeue_timeout_seconds)
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            ttl_seconds: default_ttl(),
        }
    }
}

impl IdempotencyConfig {
    /// Marker lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: default_worker_name(),
            concurrency: default_concurrency(),
            sink_timeout_seconds: default_sink_timeout(),
        }
    }
}

impl WorkerConfig {
    /// Bound on a single sink call.
    #[must_use]
    pub const fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_seconds)
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_sink_prefix(),
        }
    }
}

impl CourierConfig {
    /// Load configuration from `config/default.toml`, `config/local.toml`
    /// and `COURIER_*` environment variables, in that order.
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), with an extra TOML file merged after the
    /// defaults and before the environment.
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be parsed or the result is invalid.
    pub fn load_with(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Toml::file("config/local.toml"));

        if let Some(path) = extra {
            figment = figment.merge(Toml::file(path));
        }

        let config: Self = figment
            .merge(Env::prefixed("COURIER_").split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings and warn about risky ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.name.is_empty() || self.queue.dead_letter.is_empty() {
            return Err(ConfigError::Invalid("queue names must not be empty".into()));
        }
        if self.queue.name == self.queue.dead_letter {
            return Err(ConfigError::Invalid(format!(
                "primary and dead-letter queues are both `{}`",
                self.queue.name
            )));
        }
        if self.queue.dequeue_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "queue.dequeue_timeout_seconds must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be positive".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        if self.idempotency.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("idempotency.ttl_seconds must be positive".into()));
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid("worker.concurrency must be positive".into()));
        }

        let horizon = self.worst_case_latency();
        if self.idempotency.ttl() < horizon {
            warn!(
                ttl_seconds = self.idempotency.ttl_seconds,
                horizon_seconds = horizon.as_secs(),
                "idempotency TTL is shorter than the worst-case retry latency; \
                 duplicates may be processed after the marker expires"
            );
        }

        Ok(())
    }

    /// Longest a single job can stay in flight: every attempt hitting the
    /// sink timeout plus every backoff delay.
    #[must_use]
    pub fn worst_case_latency(&self) -> Duration {
        self.worker
            .sink_timeout()
            .saturating_mul(self.retry.max_attempts)
            .saturating_add(self.retry.retry_horizon())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CourierConfig::default();
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(config.queue.name, "jobs");
        assert_eq!(config.queue.dead_letter, "jobs:dead");
        assert_eq!(config.queue.dequeue_timeout(), Duration::from_secs(5));
        assert_eq!(config.idempotency.key_prefix, "idem:");
        assert_eq!(config.worker.concurrency, 1);
        assert!(!config.log.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_same_queue_names_rejected() {
        let mut config = CourierConfig::default();
        config.queue.dead_letter = config.queue.name.clone();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = CourierConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_above_ceiling_rejected() {
        let mut config = CourierConfig::default();
        config.retry.base_delay_ms = config.retry.max_delay_ms + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worst_case_latency() {
        let config = CourierConfig::default();
        // 3 x 30s sink timeouts + 2s + 4s backoff
        assert_eq!(config.worst_case_latency(), Duration::from_secs(96));
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COURIER_QUEUE__NAME", "work");
            jail.set_env("COURIER_RETRY__MAX_ATTEMPTS", "5");
            jail.create_file(
                "courier.toml",
                "[worker]\nconcurrency = 4\n[log]\njson = true\n",
            )?;

            let config = CourierConfig::load_with(Some(Path::new("courier.toml")))
                .expect("config should load");
            assert_eq!(config.queue.name, "work");
            assert_eq!(config.retry.max_attempts, 5);
            assert_eq!(config.retry.base_delay_ms, 1_000);
            assert_eq!(config.worker.concurrency, 4);
            assert!(config.log.json);
            Ok(())
        });
    }
}
