//! The per-request edge pipeline.
//!
//! # Order
//! ```text
//! 1. OPTIONS            → 204 + CORS headers (nothing else runs)
//! 2. nonce + CSP        → request extension + x-nonce request header
//! 3. tenant resolution  → keep x-tenant-* for the response
//! 4. rate limit (API)   → 429 short-circuit
//! 5. CSRF               → 403 short-circuit
//! 6. handler
//! 7. CSRF token/cookies → response
//! 8. hardening headers, tenant headers, X-RateLimit-*
//! 9. auth-surface lockdown headers
//! ```
//!
//! The path seen here is already canonical; see `http::request::canonical_request`.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};

use crate::context::{merge_tenant_headers, X_NONCE};
use crate::http::server::GatewayState;
use crate::observability::metrics;
use crate::security::csrf::{forbidden, CsrfOutcome, RequestView};
use crate::security::now_ms;
use crate::security::rate_limit::gate::{too_many_requests, write_headers};
use crate::security::rate_limit::RateLimitKey;

/// Axum middleware running every gateway stage around the inner handler.
pub async fn edge_pipeline(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // 1. Preflight
    if method == Method::OPTIONS {
        return finish(&method, state.cors.preflight(request.headers()));
    }

    // 2. Nonce + CSP
    let policy = state.nonce.generate();
    if let Ok(value) = HeaderValue::from_str(&policy.nonce) {
        request.headers_mut().insert(X_NONCE, value);
    }
    request.extensions_mut().insert(policy.clone());

    // 3. Tenant
    let tenant_headers = state.tenant.resolve(request.headers()).await;

    // 4. Rate limit
    let mut decision = None;
    if state.rate_limit.applies_to(&path) {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = state.rate_limit.client_id(request.headers(), peer);
        let key = RateLimitKey::for_path(client, &path);
        if let Some(d) = state.rate_limit.check(&key).await {
            if !d.success {
                return finish(&method, too_many_requests(&d, now_ms()));
            }
            decision = Some(d);
        }
    }

    // 5. CSRF
    let outcome = state.csrf.evaluate(RequestView::from_request(&request));
    if matches!(outcome, CsrfOutcome::Reject(_)) {
        return finish(&method, forbidden());
    }

    // 6. + 7.
    let response = next.run(request).await;
    let mut response = state.csrf.attach(outcome, response);

    // 8. + 9. Response headers
    let headers = response.headers_mut();
    merge_tenant_headers(&tenant_headers, headers);
    if let Some(d) = decision {
        write_headers(headers, &d);
    }
    state.hardening.apply_global(headers, &policy);
    state.hardening.apply_auth_surface(&path, headers);

    finish(&method, response)
}

fn finish(method: &Method, response: Response) -> Response {
    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}
