//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (byte lengths, windows > 0)
//! - Check header names and path patterns are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::security::rate_limit::identify::parse_proxy;

/// Minimum secret length accepted for HMAC keys.
pub const MIN_SECRET_BYTES: usize = 16;

/// Minimum salt length accepted for tokens.
pub const MIN_SALT_BYTES: usize = 8;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be > 0"));
    }

    let csrf = &config.csrf;
    for name in std::iter::once(&csrf.header_name).chain(csrf.alternate_headers.iter()) {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "csrf.header_name",
                format!("'{}' is not a valid header name", name),
            ));
        }
    }
    if !csrf
        .cookie_prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        errors.push(ValidationError::new(
            "csrf.cookie_prefix",
            "only ASCII letters, digits, '_', '-' and '.' are allowed",
        ));
    }
    if csrf.rotate_after_ms == 0 {
        errors.push(ValidationError::new("csrf.rotate_after_ms", "must be > 0"));
    }
    if csrf.secret_bytes < MIN_SECRET_BYTES {
        errors.push(ValidationError::new(
            "csrf.secret_bytes",
            format!("must be at least {}", MIN_SECRET_BYTES),
        ));
    }
    if csrf.salt_bytes < MIN_SALT_BYTES {
        errors.push(ValidationError::new(
            "csrf.salt_bytes",
            format!("must be at least {}", MIN_SALT_BYTES),
        ));
    }
    if !csrf.issuance_path.starts_with('/') {
        errors.push(ValidationError::new("csrf.issuance_path", "must start with '/'"));
    }
    check_patterns("csrf.protected_paths", &csrf.protected_paths, &mut errors);

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.requests == 0 {
            errors.push(ValidationError::new("rate_limit.requests", "must be > 0"));
        }
        if rl.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
        }
        if !rl.use_local && rl.redis_url.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::new(
                "rate_limit.redis_url",
                "required unless rate_limit.use_local is set",
            ));
        }
    }
    for proxy in &rl.trusted_proxies {
        if parse_proxy(proxy).is_none() {
            errors.push(ValidationError::new(
                "rate_limit.trusted_proxies",
                format!("'{}' is not an IP address or CIDR", proxy),
            ));
        }
    }
    check_patterns("rate_limit.paths", &rl.paths, &mut errors);
    check_patterns("rate_limit.exempt_paths", &rl.exempt_paths, &mut errors);
    check_patterns("headers.auth_paths", &config.headers.auth_paths, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_patterns(field: &'static str, patterns: &[String], errors: &mut Vec<ValidationError>) {
    for pattern in patterns {
        if !pattern.starts_with('/') && pattern != "*" {
            errors.push(ValidationError::new(
                field,
                format!("'{}' must start with '/'", pattern),
            ));
        }
    }
}
