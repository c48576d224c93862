//! Hardening response headers.
//!
//! # Responsibilities
//! - Global: `Referrer-Policy`, `X-Content-Type-Options`, CSP, nonce
//! - Auth surface: `X-Frame-Options: DENY`, `Permissions-Policy`
//!
//! # Design Decisions
//! - Headers are inserted (replacing upstream values) so the gateway's
//!   policy is authoritative

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::HeadersConfig;
use crate::context::nonce::{SecurityPolicy, X_NONCE};
use crate::routing::PathSet;

pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

#[derive(Debug, Clone)]
pub struct HardeningHeaders {
    referrer_policy: HeaderValue,
    permissions_policy: HeaderValue,
    auth_paths: PathSet,
}

impl HardeningHeaders {
    pub fn new(config: &HeadersConfig) -> Self {
        Self {
            referrer_policy: HeaderValue::from_str(&config.referrer_policy)
                .unwrap_or_else(|_| HeaderValue::from_static("strict-origin-when-cross-origin")),
            permissions_policy: HeaderValue::from_str(&config.permissions_policy)
                .unwrap_or_else(|_| HeaderValue::from_static("camera=(), microphone=(), geolocation=()")),
            auth_paths: PathSet::new(&config.auth_paths),
        }
    }

    /// Headers every response gets.
    pub fn apply_global(&self, headers: &mut HeaderMap, policy: &SecurityPolicy) {
        headers.insert(header::REFERRER_POLICY, self.referrer_policy.clone());
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        if let Ok(csp) = HeaderValue::from_str(&policy.csp) {
            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
        }
        if let Ok(nonce) = HeaderValue::from_str(&policy.nonce) {
            headers.insert(X_NONCE, nonce);
        }
    }

    /// Stricter headers for login and identity-provider pages.
    pub fn apply_auth_surface(&self, path: &str, headers: &mut HeaderMap) {
        if self.auth_paths.matches(path) {
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(PERMISSIONS_POLICY, self.permissions_policy.clone());
        }
    }
}
