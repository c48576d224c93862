//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → request.rs (body size limit, canonical path)
//!     → pipeline.rs (CORS, nonce, tenant, rate limit, CSRF, hardening)
//!     → issuance.rs (token endpoint) | upstream.rs (everything else)
//!     → Send to client
//! ```

pub mod issuance;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod upstream;

pub use request::{RequestLimits, X_REQUEST_ID};
pub use server::{BuildError, GatewayState, HttpServer};
