//! Fixed-window rate limiting.
//!
//! # Data Flow
//! ```text
//! request headers / peer
//!     → identify.rs (client IP, fallback constant)
//!     → RateLimitKey {client, scope}
//!     → gate.rs (selected backend, soft-fail)
//!         → remote.rs (Redis INCR + PEXPIRE, atomic)
//!         → local.rs (in-process, single instance only)
//!     → RateLimitDecision → 429 or pass + X-RateLimit-* headers
//! ```
//!
//! # Design Decisions
//! - One `RateLimiter` capability, backend chosen once at construction
//! - Store errors never reach the client: the gate allows and logs
//! - Windows are fixed; counters reset atomically at the boundary

pub mod gate;
pub mod identify;
pub mod local;
pub mod remote;

use async_trait::async_trait;
use thiserror::Error;

pub use gate::RateLimitGate;
pub use identify::{identify, TrustedProxies, UNKNOWN_CLIENT};
pub use local::LocalRateLimiter;
pub use remote::RedisRateLimiter;

/// Who is being counted, and where.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client: String,
    pub scope: String,
}

impl RateLimitKey {
    pub fn new(client: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            scope: scope.into(),
        }
    }

    /// Scope is the first path segment (`/api/items` → `api`).
    pub fn for_path(client: impl Into<String>, path: &str) -> Self {
        let scope = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("root");
        Self::new(client, scope)
    }

    pub fn to_key_string(&self) -> String {
        format!("{}:{}", self.scope, self.client)
    }
}

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window end in milliseconds since the epoch.
    pub reset_ms: i64,
}

impl RateLimitDecision {
    /// Normalize a raw window count into a decision.
    pub fn from_count(count: u64, limit: u32, reset_ms: i64) -> Self {
        Self {
            success: count <= u64::from(limit),
            limit,
            remaining: u64::from(limit).saturating_sub(count) as u32,
            reset_ms,
        }
    }

    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = self.reset_ms.saturating_sub(now_ms).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }

    /// Reset time as epoch seconds, rounded up.
    pub fn reset_secs(&self) -> i64 {
        (self.reset_ms.max(0) as u64).div_ceil(1000) as i64
    }
}

/// Failures of the counting backend itself.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("rate limit store timed out after {0} ms")]
    Timeout(u64),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(e: redis::RedisError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

/// Atomic increment-and-check against a fixed window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &RateLimitKey) -> Result<RateLimitDecision, RateLimitError>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}
