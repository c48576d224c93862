//! CSRF engine: issue, verify, rotate, apply.
//!
//! # Protocol
//! ```text
//! issuance path        → pass through (handler issues)
//! unprotected path     → pass through
//! GET/HEAD/OPTIONS     → ensure live pair, attach fresh token
//! other methods        → same-origin → verify → rotate → attach new token
//!                        any failure → 403, cookies untouched
//! ```
//!
//! # Design Decisions
//! - The engine holds only immutable settings; it is shared via `Arc`
//! - Verification never consults the issued-at cookie; staleness only
//!   triggers rotation
//! - Rotation after a successful unsafe request is the single-use mechanism:
//!   every token signed by the old secret stops verifying

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::codec;
use super::cookies::{CookieAccessor, PairState, SecretPair};
use super::origin::check_same_origin;
use super::CsrfError;
use crate::config::CsrfConfig;
use crate::observability::metrics;
use crate::routing::PathSet;
use crate::security::now_ms;

/// The request pieces the engine looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestView<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(request: &'a axum::http::Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }
}

/// Result of `issue`: a token and the pair it is bound to.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub token: String,
    pub pair: SecretPair,
    /// True when the pair was (re)generated and both cookies must be sent.
    pub fresh: bool,
}

/// What the CSRF gate decided for one request.
#[derive(Debug)]
pub enum CsrfOutcome {
    /// Not subject to enforcement; the response is left alone.
    Bypass,
    /// Allowed; attach the token header, and the cookies if fresh.
    Proceed(Issuance),
    /// Rejected. The reason is for logs only.
    Reject(CsrfError),
}

/// Stateless CSRF engine built once from configuration.
#[derive(Debug, Clone)]
pub struct CsrfEngine {
    header: HeaderName,
    alternates: Vec<HeaderName>,
    cookies: CookieAccessor,
    rotate_after_ms: u64,
    secret_bytes: usize,
    salt_bytes: usize,
    protected: PathSet,
    issuance_path: String,
}

impl CsrfEngine {
    /// Build an engine. Header names that fail to parse are skipped with an
    /// error log; validation rejects them before this point in normal startup.
    pub fn new(config: &CsrfConfig) -> Self {
        let header = HeaderName::from_bytes(config.header_name.as_bytes()).unwrap_or_else(|e| {
            tracing::error!(header = %config.header_name, error = %e, "Invalid CSRF header, using default");
            HeaderName::from_static("x-csrf-token")
        });
        let alternates = config
            .alternate_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(h) => Some(h),
                Err(e) => {
                    tracing::error!(header = %name, error = %e, "Skipping invalid alternate CSRF header");
                    None
                }
            })
            .collect();

        Self {
            header,
            alternates,
            cookies: CookieAccessor::new(
                &config.cookie_prefix,
                config.secret_bytes,
                config.secure_cookies,
            ),
            rotate_after_ms: config.rotate_after_ms,
            secret_bytes: config.secret_bytes,
            salt_bytes: config.salt_bytes,
            protected: PathSet::new(&config.protected_paths),
            issuance_path: config.issuance_path.clone(),
        }
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    pub fn cookies(&self) -> &CookieAccessor {
        &self.cookies
    }

    pub fn issuance_path(&self) -> &str {
        &self.issuance_path
    }

    /// Issue a token, reusing the request's pair when it is live.
    pub fn issue(&self, headers: &HeaderMap) -> Issuance {
        self.issue_at(headers, now_ms())
    }

    pub fn issue_at(&self, headers: &HeaderMap, now_ms: i64) -> Issuance {
        match self.cookies.read_pair(headers) {
            PairState::Present(pair) if !pair.is_stale(now_ms, self.rotate_after_ms) => Issuance {
                token: codec::derive(pair.secret(), self.salt_bytes),
                pair,
                fresh: false,
            },
            state => {
                let cause = match state {
                    PairState::Missing => "missing",
                    PairState::Corrupt => "corrupt",
                    PairState::Present(_) => "stale",
                };
                tracing::debug!(cause, "Generating new CSRF secret");
                metrics::record_csrf_rotation(cause);
                self.rotate_at(now_ms)
            }
        }
    }

    /// Generate a brand-new pair and a token for it.
    pub fn rotate_at(&self, now_ms: i64) -> Issuance {
        let pair = SecretPair::new(codec::random_bytes(self.secret_bytes), now_ms);
        Issuance {
            token: codec::derive(pair.secret(), self.salt_bytes),
            pair,
            fresh: true,
        }
    }

    /// Verify the request's token against the request's own secret cookie.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), CsrfError> {
        let secret = self
            .cookies
            .read_secret(headers)
            .ok_or(CsrfError::MissingCredential)?;
        let token = self.token_from(headers).ok_or(CsrfError::MissingCredential)?;
        let decoded = codec::decode(token, self.salt_bytes)?;
        codec::verify(&secret, &decoded)
    }

    /// Decide what to do with a request, before the handler runs.
    pub fn evaluate(&self, request: RequestView<'_>) -> CsrfOutcome {
        self.evaluate_at(request, now_ms())
    }

    pub fn evaluate_at(&self, request: RequestView<'_>, now_ms: i64) -> CsrfOutcome {
        let path = request.uri.path();
        if path == self.issuance_path || !self.protected.matches(path) {
            return CsrfOutcome::Bypass;
        }

        if is_safe_method(request.method) {
            return CsrfOutcome::Proceed(self.issue_at(request.headers, now_ms));
        }

        let checked = check_same_origin(request.headers, request.uri)
            .and_then(|()| self.verify(request.headers));
        match checked {
            Ok(()) => {
                metrics::record_csrf_rotation("consumed");
                CsrfOutcome::Proceed(self.rotate_at(now_ms))
            }
            Err(reason) => {
                tracing::warn!(
                    method = %request.method,
                    path = %path,
                    reason = reason.as_label(),
                    "CSRF check failed"
                );
                metrics::record_csrf_rejected(reason.as_label());
                CsrfOutcome::Reject(reason)
            }
        }
    }

    /// Evaluate the request and fold the outcome into `response`.
    pub fn apply(&self, request: RequestView<'_>, response: Response) -> Response {
        let outcome = self.evaluate(request);
        self.attach(outcome, response)
    }

    /// Fold a previously evaluated outcome into `response`.
    pub fn attach(&self, outcome: CsrfOutcome, mut response: Response) -> Response {
        match outcome {
            CsrfOutcome::Bypass => response,
            CsrfOutcome::Reject(_) => forbidden(),
            CsrfOutcome::Proceed(issuance) => {
                self.write_issuance(response.headers_mut(), &issuance);
                response
            }
        }
    }

    /// Token header always; cookies only for a fresh pair.
    pub fn write_issuance(&self, headers: &mut HeaderMap, issuance: &Issuance) {
        if let Ok(value) = HeaderValue::from_str(&issuance.token) {
            headers.insert(self.header.clone(), value);
        }
        if issuance.fresh {
            self.cookies.write_pair(headers, &issuance.pair);
        }
    }

    fn token_from<'h>(&self, headers: &'h HeaderMap) -> Option<&'h str> {
        std::iter::once(&self.header)
            .chain(self.alternates.iter())
            .filter_map(|name| headers.get(name))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// GET, HEAD and OPTIONS never need a token.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// The single response every CSRF failure collapses to.
pub fn forbidden() -> Response {
    let mut response = (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": {
                "code": "forbidden",
                "message": "Request could not be verified"
            }
        })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
