//! Request identification and canonicalization.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Echo it on the response for correlation
//! - Rewrite the path to its canonical form before routing
//! - Reject declared bodies above `limits.max_body_size`
//!
//! # Design Decisions
//! - Request ID added as early as possible so every log line carries it
//! - Limits checked on headers only (early rejection); chunked bodies are not counted

use axum::{
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderName, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::LimitsConfig;
use crate::routing::normalize_path;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Outermost layer: assigns `x-request-id`.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies `x-request-id` from the request onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_body_size: u64,
}

impl RequestLimits {
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            max_body_size: config.max_body_size,
        }
    }
}

/// Runs before routing: everything downstream (routes, gates, upstream)
/// sees the same canonical path.
pub async fn canonical_request(
    State(limits): State<RequestLimits>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(value) = request.headers().get(header::CONTENT_LENGTH) {
        match value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            None => return reject(StatusCode::BAD_REQUEST, "bad_request", "Malformed Content-Length"),
            Some(length) if length > limits.max_body_size => {
                tracing::warn!(
                    length,
                    limit = limits.max_body_size,
                    "Request body exceeds limit"
                );
                return reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "payload_too_large",
                    "Request body too large",
                );
            }
            Some(_) => {}
        }
    }

    let path = request.uri().path().to_string();
    let canonical = match normalize_path(&path) {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Rejected request path");
            return bad_path();
        }
    };

    if canonical != path {
        let path_and_query = match request.uri().query() {
            Some(query) => format!("{}?{}", canonical, query),
            None => canonical.clone(),
        };
        let mut parts = request.uri().clone().into_parts();
        parts.path_and_query = match PathAndQuery::try_from(path_and_query) {
            Ok(pq) => Some(pq),
            Err(_) => return bad_path(),
        };
        match Uri::from_parts(parts) {
            Ok(uri) => {
                tracing::debug!(from = %path, to = %canonical, "Canonicalized request path");
                *request.uri_mut() = uri;
            }
            Err(_) => return bad_path(),
        }
    }

    next.run(request).await
}

fn bad_path() -> Response {
    reject(StatusCode::BAD_REQUEST, "bad_request", "Malformed request path")
}

fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}
