//! In-process idempotency markers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::IdempotencyStore;
use crate::error::QueueResult;

/// Stand-in expiry for TTLs too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// In-memory [`IdempotencyStore`].
///
/// Check and insert happen under one lock, which makes the claim atomic
/// across tasks sharing the store. Expired markers are swept lazily.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdempotencyStore {
    markers: Arc<Mutex<HashMap<String, Instant>>>,
}

impl MemoryIdempotencyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is currently claimed.
    #[must_use]
    pub fn is_claimed(&self, key: &str) -> bool {
        self.markers
            .lock()
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn claim(&self, key: &str, ttl: Duration) -> QueueResult<bool> {
        let now = Instant::now();
        let mut markers = self.markers.lock();

        if markers.get(key).is_some_and(|expires_at| *expires_at > now) {
            return Ok(false);
        }

        markers.retain(|_, expires_at| *expires_at > now);
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);
        markers.insert(key.to_string(), expires_at);
        Ok(true)
    }

    async fn release(&self, key: &str) -> QueueResult<()> {
        self.markers.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_claim_is_rejected() {
        let store = MemoryIdempotencyStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("idem:a", ttl).await.unwrap());
        assert!(!store.claim("idem:a", ttl).await.unwrap());
        assert!(store.claim("idem:b", ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_expires_after_ttl() {
        let store = MemoryIdempotencyStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("idem:a", ttl).await.unwrap());
        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(!store.is_claimed("idem:a"));
        assert!(store.claim("idem:a", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_unbounded_ttl_does_not_overflow() {
        let store = MemoryIdempotencyStore::new();

        assert!(store.claim("idem:a", Duration::MAX).await.unwrap());
        assert!(store.is_claimed("idem:a"));
        assert!(!store.claim("idem:a", Duration::MAX).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_allows_reclaim() {
        let store = MemoryIdempotencyStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.claim("idem:a", ttl).await.unwrap());
        store.release("idem:a").await.unwrap();
        assert!(store.claim("idem:a", ttl).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let store = MemoryIdempotencyStore::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.claim("idem:a", Duration::from_secs(60)).await.unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
