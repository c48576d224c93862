//! Rate limit coordinator.
//!
//! Chooses the backend once from configuration, decides which paths are
//! counted, and turns store failures into "allowed" (soft-fail-open).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::identify::{identify, TrustedProxies};
use super::{LocalRateLimiter, RateLimitDecision, RateLimitError, RateLimitKey, RateLimiter, RedisRateLimiter};
use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::routing::PathSet;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate limiting as seen by the pipeline.
#[derive(Clone)]
pub struct RateLimitGate {
    limiter: Option<Arc<dyn RateLimiter>>,
    paths: PathSet,
    exempt: PathSet,
    trusted: TrustedProxies,
}

impl RateLimitGate {
    /// Build the gate the configuration asks for.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let limiter: Option<Arc<dyn RateLimiter>> = if !config.enabled {
            tracing::info!("Rate limiting disabled");
            None
        } else if config.use_local {
            tracing::warn!(
                requests = config.requests,
                window_ms = config.window_ms,
                "Using in-process rate limiter; counts are per instance"
            );
            Some(Arc::new(LocalRateLimiter::new(config.requests, config.window_ms)))
        } else {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                RateLimitError::StoreUnavailable("rate_limit.redis_url not set".to_string())
            })?;
            Some(Arc::new(RedisRateLimiter::new(
                url,
                config.key_prefix.clone(),
                config.requests,
                config.window_ms,
                Duration::from_millis(config.store_timeout_ms),
            )?))
        };

        Ok(Self::with_limiter(limiter, config))
    }

    /// Build a gate around an explicit backend.
    pub fn with_limiter(limiter: Option<Arc<dyn RateLimiter>>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            paths: PathSet::new(&config.paths),
            exempt: PathSet::new(&config.exempt_paths),
            trusted: TrustedProxies::new(&config.trusted_proxies),
        }
    }

    pub fn disabled() -> Self {
        Self {
            limiter: None,
            paths: PathSet::default(),
            exempt: PathSet::default(),
            trusted: TrustedProxies::default(),
        }
    }

    /// True when requests to `path` are counted.
    pub fn applies_to(&self, path: &str) -> bool {
        self.limiter.is_some() && self.paths.matches(path) && !self.exempt.matches(path)
    }

    /// Counting identity of the caller; see `identify`.
    pub fn client_id(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        identify(headers, peer, &self.trusted)
    }

    /// Count the request. `None` means the store failed and the request is
    /// let through without rate-limit headers.
    pub async fn check(&self, key: &RateLimitKey) -> Option<RateLimitDecision> {
        let limiter = self.limiter.as_ref()?;
        match limiter.check(key).await {
            Ok(decision) => {
                if !decision.success {
                    tracing::warn!(
                        client = %key.client,
                        scope = %key.scope,
                        limit = decision.limit,
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited(&key.scope);
                }
                Some(decision)
            }
            Err(e) => {
                tracing::warn!(
                    backend = limiter.backend(),
                    error = %e,
                    "Rate limit store unavailable, allowing request"
                );
                metrics::record_rate_limit_store_error();
                None
            }
        }
    }
}

/// Attach `X-RateLimit-*` headers for a decision.
pub fn write_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs()));
}

/// The 429 response for a rejected decision.
pub fn too_many_requests(decision: &RateLimitDecision, now_ms: i64) -> Response {
    let retry_after = decision.retry_after_secs(now_ms);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": {
                "code": "rate_limited",
                "message": "Too many requests",
                "retryAfter": retry_after
            }
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    write_headers(headers, decision);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl RateLimiter for BrokenStore {
        async fn check(&self, _: &RateLimitKey) -> Result<RateLimitDecision, RateLimitError> {
            Err(RateLimitError::StoreUnavailable("connection refused".to_string()))
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    fn local_config() -> RateLimitConfig {
        RateLimitConfig {
            use_local: true,
            requests: 1,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_path_selection() {
        let gate = RateLimitGate::from_config(&local_config()).unwrap();
        assert!(gate.applies_to("/api/items"));
        assert!(!gate.applies_to("/api/auth/callback/github"));
        assert!(!gate.applies_to("/dashboard"));
    }

    #[test]
    fn test_disabled_gate_applies_nowhere() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let gate = RateLimitGate::from_config(&config).unwrap();
        assert!(!gate.applies_to("/api/items"));
        assert!(!RateLimitGate::disabled().applies_to("/api/items"));
    }

    #[test]
    fn test_remote_without_url_is_an_error() {
        assert!(RateLimitGate::from_config(&RateLimitConfig::default()).is_err());
    }

    #[test]
    fn test_client_id_honors_trusted_proxies() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.2"));
        let peer: Option<SocketAddr> = Some("127.0.0.1:5000".parse().unwrap());

        let untrusting = RateLimitGate::from_config(&local_config()).unwrap();
        assert_eq!(untrusting.client_id(&headers, peer), "127.0.0.1");

        let trusting = RateLimitGate::from_config(&RateLimitConfig {
            trusted_proxies: vec!["127.0.0.0/8".to_string()],
            ..local_config()
        })
        .unwrap();
        assert_eq!(trusting.client_id(&headers, peer), "198.51.100.2");
    }

    #[tokio::test]
    async fn test_store_failure_soft_fails_open() {
        let gate = RateLimitGate::with_limiter(Some(Arc::new(BrokenStore)), &local_config());
        assert!(gate.applies_to("/api/items"));
        assert!(gate.check(&RateLimitKey::new("a", "api")).await.is_none());
    }

    #[tokio::test]
    async fn test_local_gate_rejects_over_limit() {
        let gate = RateLimitGate::from_config(&local_config()).unwrap();
        let key = RateLimitKey::new("a", "api");
        assert!(gate.check(&key).await.unwrap().success);
        assert!(!gate.check(&key).await.unwrap().success);
    }

    #[test]
    fn test_too_many_requests_headers() {
        let decision = RateLimitDecision::from_count(4, 3, 10_000);
        let response = too_many_requests(&decision, 8_500);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let h = response.headers();
        assert_eq!(h["x-ratelimit-limit"], "3");
        assert_eq!(h["x-ratelimit-remaining"], "0");
        assert_eq!(h["x-ratelimit-reset"], "10");
        assert_eq!(h[header::RETRY_AFTER], "2");
    }
}
