//! Tenant resolution.
//!
//! The resolver may return any headers; the pipeline copies only the
//! `x-tenant-*` ones onto the final response.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};

pub const TENANT_HEADER_PREFIX: &str = "x-tenant-";

/// Resolves the tenant for a request and describes it as response headers.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(&self, request: &HeaderMap) -> HeaderMap;
}

/// Tenant from the left-most label of a host name with at least three labels
/// (`acme.app.example.com` → `acme`). IP literals never name a tenant.
#[derive(Debug, Clone, Default)]
pub struct SubdomainTenantResolver;

#[async_trait]
impl TenantResolver for SubdomainTenantResolver {
    async fn resolve(&self, request: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        let host = request
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| h.split(':').next().unwrap_or(h).to_ascii_lowercase());

        let tenant = host.as_deref().and_then(|h| {
            if h.parse::<std::net::IpAddr>().is_ok() {
                return None;
            }
            let labels: Vec<&str> = h.split('.').collect();
            (labels.len() >= 3 && labels[0] != "www").then(|| labels[0].to_string())
        });

        if let Some(tenant) = tenant {
            if let Ok(value) = HeaderValue::from_str(&tenant) {
                out.insert("x-tenant-id", value);
            }
        }
        out
    }
}

/// Copy the namespaced tenant headers from `resolved` into `target`.
pub fn merge_tenant_headers(resolved: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in resolved {
        if name.as_str().starts_with(TENANT_HEADER_PREFIX) {
            target.insert(name.clone(), value.clone());
        }
    }
}
