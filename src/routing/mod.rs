//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Configured patterns (csrf.protected_paths, rate_limit.paths, ...)
//!     → matcher.rs (compile to PathPattern)
//!     → PathSet (immutable, shared by the gates)
//!
//! Request path
//!     → normalize.rs (canonical form, before routing)
//!     → PathSet::matches
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches the same way

pub mod matcher;
pub mod normalize;

pub use matcher::{PathPattern, PathSet};
pub use normalize::{normalize_path, PathError};
