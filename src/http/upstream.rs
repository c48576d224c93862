//! Forwarding to the protected application.

use std::str::FromStr;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderName, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Json,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;

use crate::http::server::GatewayState;

/// Hop-by-hop headers that must not be forwarded.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

/// HTTP client bound to one upstream address.
#[derive(Clone)]
pub struct Upstream {
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl Upstream {
    pub fn new(address: &str) -> Result<Self, axum::http::uri::InvalidUri> {
        let authority = Authority::from_str(address)?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self { authority, client })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Send the request upstream, streaming both bodies.
    pub async fn forward(&self, request: Request) -> Response {
        let (mut parts, body) = request.into_parts();

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = match Uri::from_parts(uri_parts) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(error = %e, "Could not build upstream URI");
                return bad_gateway();
            }
        };
        for name in HOP_BY_HOP.iter() {
            parts.headers.remove(name);
        }

        let path = parts.uri.path().to_string();
        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %self.authority, path = %path, error = %e, "Upstream error");
                bad_gateway()
            }
        }
    }
}

/// Fallback handler: forward, or 404 when no upstream is configured.
pub async fn forward(State(state): State<GatewayState>, request: Request) -> Response {
    match state.upstream.as_ref() {
        Some(upstream) => upstream.forward(request).await,
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": "not_found", "message": "Not found" } })),
        )
            .into_response(),
    }
}

fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": { "code": "bad_gateway", "message": "Upstream request failed" } })),
    )
        .into_response()
}
