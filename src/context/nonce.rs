//! Per-request nonce and Content-Security-Policy.

use axum::http::HeaderName;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

/// Carries the nonce to the upstream (request) and to the page (response).
pub const X_NONCE: HeaderName = HeaderName::from_static("x-nonce");

/// Nonce plus the CSP built around it. Stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub nonce: String,
    pub csp: String,
}

/// Builds the nonce and CSP for one request.
pub trait NonceProvider: Send + Sync {
    fn generate(&self) -> SecurityPolicy;
}

/// Random nonce with a strict, nonce-based script policy.
#[derive(Debug, Clone, Default)]
pub struct StrictCspProvider;

impl NonceProvider for StrictCspProvider {
    fn generate(&self) -> SecurityPolicy {
        let nonce = STANDARD.encode(Uuid::new_v4().as_bytes());
        let csp = [
            "default-src 'self'".to_string(),
            format!("script-src 'self' 'nonce-{}' 'strict-dynamic'", nonce),
            format!("style-src 'self' 'nonce-{}'", nonce),
            "img-src 'self' blob: data:".to_string(),
            "font-src 'self'".to_string(),
            "object-src 'none'".to_string(),
            "base-uri 'self'".to_string(),
            "form-action 'self'".to_string(),
            "frame-ancestors 'none'".to_string(),
            "upgrade-insecure-requests".to_string(),
        ]
        .join("; ");

        SecurityPolicy { nonce, csp }
    }
}
