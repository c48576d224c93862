//! In-process fixed-window counter.
//!
//! Approximate by nature: each gateway instance counts on its own, so with N
//! instances a client may get up to N × limit requests per window. Selected
//! only through `rate_limit.use_local`.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter};
use crate::security::now_ms;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_ms: i64,
    count: u64,
}

pub struct LocalRateLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window_ms: u64,
}

impl LocalRateLimiter {
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window_ms,
        }
    }

    /// Count one request for `key` at `now_ms`. A window opens on the first
    /// request and closes `window_ms` later.
    pub fn check_at(&self, key: &RateLimitKey, now_ms: i64) -> RateLimitDecision {
        let window_ms = self.window_ms as i64;
        let mut entry = self.windows.entry(key.to_key_string()).or_insert(Window {
            started_ms: now_ms,
            count: 0,
        });

        if now_ms >= entry.started_ms.saturating_add(window_ms) || now_ms < entry.started_ms {
            *entry = Window {
                started_ms: now_ms,
                count: 0,
            };
        }
        entry.count += 1;

        RateLimitDecision::from_count(entry.count, self.limit, entry.started_ms + window_ms)
    }

    /// Drop windows that ended before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) {
        let window_ms = self.window_ms as i64;
        self.windows
            .retain(|_, w| now_ms < w.started_ms.saturating_add(window_ms));
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn check(&self, key: &RateLimitKey) -> Result<RateLimitDecision, RateLimitError> {
        let now = now_ms();
        // keep memory bounded by forgetting finished windows now and then
        if self.windows.len() > 10_000 {
            self.purge_expired(now);
        }
        Ok(self.check_at(key, now))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
