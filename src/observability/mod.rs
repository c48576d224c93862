//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates and pipeline produce:
//!     → logging.rs (structured log events, rejection reasons)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines via the trace span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
