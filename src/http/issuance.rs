//! Token bootstrap endpoint.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct TokenData {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub data: TokenData,
}

/// `GET <issuance_path>`: hand out a token, setting the cookies if the
/// request had no live pair.
pub async fn issue_token(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let issuance = state.csrf.issue(&headers);
    tracing::debug!(fresh = issuance.fresh, "Issued CSRF token");

    let body = TokenResponse {
        data: TokenData {
            token: issuance.token.clone(),
        },
    };
    let mut response = (StatusCode::OK, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    state.csrf.write_issuance(headers, &issuance);
    response
}
