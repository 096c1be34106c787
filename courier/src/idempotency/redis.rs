//! Redis-backed idempotency markers using `SET key 1 NX EX ttl`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error};

use super::IdempotencyStore;
use crate::error::QueueResult;

/// [`IdempotencyStore`] over Redis string keys.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisIdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisIdempotencyStore")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisIdempotencyStore {
    /// Wrap an existing connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client.get_connection_manager().await?))
    }

    /// Seconds for `EX`, which rejects zero.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn claim(&self, key: &str, ttl: Duration) -> QueueResult<bool> {
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(error = %e, key, "SET NX failed");
                e
            })?;

        let claimed = reply.is_some();
        debug!(key, claimed, "SET NX");
        Ok(claimed)
    }

    async fn release(&self, key: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}
