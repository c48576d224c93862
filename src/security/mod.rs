//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (OPTIONS short-circuit)
//!     → rate_limit/ (per-client fixed window)
//!     → csrf/ (same-origin + token, rotation)
//!     → headers.rs (hardening headers on the way out)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - CSRF fails closed; rate limiting fails open when its store is down
//! - No trust in client input

pub mod cors;
pub mod csrf;
pub mod headers;
pub mod rate_limit;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the epoch.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
