//! Edge security gateway library.
//!
//! CSRF double-submit protection, fixed-window rate limiting and response
//! hardening in front of an HTTP application.

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayState, HttpServer};
pub use lifecycle::Shutdown;
