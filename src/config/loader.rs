//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "EDGE_GUARD_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `EDGE_GUARD_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

    if let Some(v) = var("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = var("UPSTREAM") {
        config.upstream.address = Some(v).filter(|s| !s.is_empty());
    }

    if let Some(v) = var("CSRF_HEADER") {
        config.csrf.header_name = v.to_ascii_lowercase();
    }
    if let Some(v) = var("CSRF_ALTERNATE_HEADERS") {
        config.csrf.alternate_headers = split_list(&v)
            .into_iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
    }
    if let Some(v) = var("CSRF_COOKIE_PREFIX") {
        config.csrf.cookie_prefix = v;
    }
    if let Some(v) = var("CSRF_ROTATE_AFTER_MS") {
        config.csrf.rotate_after_ms = parse_var("CSRF_ROTATE_AFTER_MS", &v)?;
    }
    if let Some(v) = var("CSRF_SECRET_BYTES") {
        config.csrf.secret_bytes = parse_var("CSRF_SECRET_BYTES", &v)?;
    }
    if let Some(v) = var("CSRF_SALT_BYTES") {
        config.csrf.salt_bytes = parse_var("CSRF_SALT_BYTES", &v)?;
    }
    if let Some(v) = var("CSRF_SECURE_COOKIES") {
        config.csrf.secure_cookies = parse_flag("CSRF_SECURE_COOKIES", &v)?;
    }
    if let Some(v) = var("CSRF_PROTECTED_PATHS") {
        config.csrf.protected_paths = split_list(&v);
    }

    if let Some(v) = var("RATE_LIMIT_REQUESTS") {
        config.rate_limit.requests = parse_var("RATE_LIMIT_REQUESTS", &v)?;
    }
    if let Some(v) = var("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse_var("RATE_LIMIT_WINDOW_MS", &v)?;
    }
    if let Some(v) = var("RATE_LIMIT_DISABLED") {
        config.rate_limit.enabled = !parse_flag("RATE_LIMIT_DISABLED", &v)?;
    }
    if let Some(v) = var("RATE_LIMIT_LOCAL") {
        config.rate_limit.use_local = parse_flag("RATE_LIMIT_LOCAL", &v)?;
    }
    if let Some(v) = var("RATE_LIMIT_TRUSTED_PROXIES") {
        config.rate_limit.trusted_proxies = split_list(&v);
    }
    if let Some(v) = var("MAX_BODY_SIZE") {
        config.limits.max_body_size = parse_var("MAX_BODY_SIZE", &v)?;
    }
    if let Some(v) = var("REDIS_URL") {
        config.rate_limit.redis_url = Some(v).filter(|s| !s.is_empty());
    }

    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(suffix: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| env_error(suffix, value))
}

fn parse_flag(suffix: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(env_error(suffix, value)),
    }
}

fn env_error(suffix: &str, value: &str) -> ConfigError {
    ConfigError::Env {
        var: format!("{}{}", ENV_PREFIX, suffix),
        value: value.to_string(),
    }
}
