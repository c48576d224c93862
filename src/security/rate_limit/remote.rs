//! Redis-backed fixed-window counter.
//!
//! Each window is its own key, `{prefix}:{scope}:{client}:{bucket}` with
//! `bucket = now_ms / window_ms`, incremented and given a TTL inside one
//! `MULTI`/`EXEC`. Every gateway instance sees the same count.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter};
use crate::security::now_ms;

pub struct RedisRateLimiter {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
    limit: u32,
    window_ms: u64,
    timeout: Duration,
}

impl RedisRateLimiter {
    /// Create a limiter. Only the URL is checked here; the connection is
    /// opened on first use so an unreachable store does not block startup.
    pub fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        limit: u32,
        window_ms: u64,
        timeout: Duration,
    ) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix: key_prefix.into(),
            limit,
            window_ms,
            timeout,
        })
    }

    /// Storage key for `key` in the window containing `now_ms`.
    pub fn window_key(&self, key: &RateLimitKey, now_ms: i64) -> (String, i64) {
        let window_ms = self.window_ms as i64;
        let bucket = now_ms.div_euclid(window_ms);
        let reset_ms = (bucket + 1) * window_ms;
        (
            format!("{}:{}:{}", self.key_prefix, key.to_key_string(), bucket),
            reset_ms,
        )
    }

    async fn connection(&self) -> Result<ConnectionManager, RateLimitError> {
        let manager = self
            .connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(manager.clone())
    }

    async fn increment(&self, storage_key: &str) -> Result<u64, RateLimitError> {
        let mut conn = self.connection().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(storage_key, 1)
            .pexpire(storage_key, self.window_ms as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Count one request for `key` at `now_ms`.
    pub async fn check_at(
        &self,
        key: &RateLimitKey,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let (storage_key, reset_ms) = self.window_key(key, now_ms);

        let count = tokio::time::timeout(self.timeout, self.increment(&storage_key))
            .await
            .map_err(|_| RateLimitError::Timeout(self.timeout.as_millis() as u64))??;

        Ok(RateLimitDecision::from_count(count, self.limit, reset_ms))
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &RateLimitKey) -> Result<RateLimitDecision, RateLimitError> {
        self.check_at(key, now_ms()).await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RedisRateLimiter {
        RedisRateLimiter::new(
            "redis://127.0.0.1:1/",
            "edge-guard:ratelimit",
            3,
            2_000,
            Duration::from_millis(100),
        )
        .unwrap()
    }

    #[test]
    fn test_window_key_layout() {
        let limiter = limiter();
        let key = RateLimitKey::new("203.0.113.7", "api");

        let (storage_key, reset) = limiter.window_key(&key, 5_500);
        assert_eq!(storage_key, "edge-guard:ratelimit:api:203.0.113.7:2");
        assert_eq!(reset, 6_000);

        // same window, same key; next window, next key
        assert_eq!(limiter.window_key(&key, 4_000).0, storage_key);
        assert_ne!(limiter.window_key(&key, 6_000).0, storage_key);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = RedisRateLimiter::new("not a url", "p", 1, 1_000, Duration::from_millis(10));
        assert!(matches!(result, Err(RateLimitError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_error_not_a_panic() {
        // port 1 is never a Redis server
        let result = limiter().check(&RateLimitKey::new("a", "api")).await;
        assert!(result.is_err());
    }

    /// Runs against a live server named by `EDGE_GUARD_TEST_REDIS_URL`;
    /// skipped otherwise.
    #[tokio::test]
    async fn test_live_store_counts_and_resets() {
        let Ok(url) = std::env::var("EDGE_GUARD_TEST_REDIS_URL") else {
            return;
        };
        let prefix = format!("edge-guard-test:{}", uuid::Uuid::new_v4());
        let limiter =
            RedisRateLimiter::new(&url, prefix, 3, 2_000, Duration::from_secs(2)).unwrap();
        let key = RateLimitKey::new("203.0.113.7", "api");

        let window_start = now_ms().div_euclid(2_000) * 2_000;
        let now = window_start + 100;

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at(&key, now).await.unwrap();
            assert!(decision.success);
            assert_eq!(decision.limit, 3);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_ms, window_start + 2_000);
        }

        let decision = limiter.check_at(&key, now).await.unwrap();
        assert!(!decision.success);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_ms, window_start + 2_000);

        let decision = limiter.check_at(&key, now + 2_000).await.unwrap();
        assert!(decision.success);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_ms, window_start + 4_000);
    }
}
