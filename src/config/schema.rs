//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Application the gateway protects.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// CORS preflight answers.
    pub cors: CorsConfig,

    /// Hardening response headers.
    pub headers: HeadersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest declared `Content-Length` accepted, in bytes.
    pub max_body_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). Unset means the gateway
    /// answers 404 for everything it does not serve itself.
    pub address: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Primary request/response header carrying the token.
    pub header_name: String,

    /// Additional request headers accepted as token carriers.
    pub alternate_headers: Vec<String>,

    /// Prefix prepended to both cookie names.
    pub cookie_prefix: String,

    /// Age in milliseconds after which the secret is rotated on next touch.
    pub rotate_after_ms: u64,

    /// Length of the random secret in bytes.
    pub secret_bytes: usize,

    /// Length of the per-token salt in bytes.
    pub salt_bytes: usize,

    /// Emit the `Secure` cookie attribute.
    pub secure_cookies: bool,

    /// Path patterns under CSRF enforcement (`/api/*` style or exact).
    pub protected_paths: Vec<String>,

    /// Bootstrap endpoint that hands out tokens; never enforced.
    pub issuance_path: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_name: "x-csrf-token".to_string(),
            alternate_headers: vec!["x-xsrf-token".to_string()],
            cookie_prefix: String::new(),
            rotate_after_ms: 60 * 60 * 1000,
            secret_bytes: 32,
            salt_bytes: 16,
            secure_cookies: true,
            protected_paths: vec!["/api/*".to_string()],
            issuance_path: "/api/csrf".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Use the in-process counter instead of Redis (tests, single node).
    pub use_local: bool,

    /// Requests allowed per window per client and scope.
    pub requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Redis connection URL for the shared counter.
    pub redis_url: Option<String>,

    /// Namespace for counter keys in Redis.
    pub key_prefix: String,

    /// Upper bound for one store round trip in milliseconds.
    pub store_timeout_ms: u64,

    /// Path patterns subject to rate limiting.
    pub paths: Vec<String>,

    /// Path patterns never rate limited (identity-provider callbacks).
    pub exempt_paths: Vec<String>,

    /// Proxies (IPs or CIDRs) whose `x-forwarded-for` / `x-real-ip` headers
    /// are believed. Requests from any other peer are keyed by peer address.
    pub trusted_proxies: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_local: false,
            requests: 60,
            window_ms: 60_000,
            redis_url: None,
            key_prefix: "edge-guard:ratelimit".to_string(),
            store_timeout_ms: 250,
            paths: vec!["/api/*".to_string()],
            exempt_paths: vec!["/api/auth/callback/*".to_string()],
            trusted_proxies: Vec::new(),
        }
    }
}

/// CORS preflight configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins echoed back in `Access-Control-Allow-Origin`. `*` allows any.
    pub allowed_origins: Vec<String>,

    /// Methods advertised to preflight requests.
    pub allowed_methods: Vec<String>,

    /// Request headers advertised to preflight requests.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: ["content-type", "authorization", "x-csrf-token", "x-xsrf-token"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            max_age_secs: 600,
        }
    }
}

/// Hardening header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// `Referrer-Policy` value.
    pub referrer_policy: String,

    /// Routes that additionally get frame and permissions lockdown.
    pub auth_paths: Vec<String>,

    /// `Permissions-Policy` value for auth routes.
    pub permissions_policy: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            auth_paths: vec!["/auth/*".to_string(), "/login/*".to_string()],
            permissions_policy: "camera=(), microphone=(), geolocation=()".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [csrf]
            cookie_prefix = "__Host-"

            [rate_limit]
            use_local = true
            requests = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.csrf.cookie_prefix, "__Host-");
        assert_eq!(config.csrf.header_name, "x-csrf-token");
        assert_eq!(config.rate_limit.requests, 3);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert!(config.rate_limit.use_local);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.rate_limit.trusted_proxies.is_empty());
        assert_eq!(config.limits.max_body_size, 2 * 1024 * 1024);
    }
}
