//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared gateway state from configuration
//! - Create the Axum Router (issuance route + upstream fallback)
//! - Wire up middleware (request ID, tracing, timeout, path canonicalization,
//!   edge pipeline)
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::context::{NonceProvider, StrictCspProvider, SubdomainTenantResolver, TenantResolver};
use crate::http::issuance::issue_token;
use crate::http::pipeline::edge_pipeline;
use crate::http::request::{
    canonical_request, propagate_request_id, set_request_id, RequestLimits,
};
use crate::http::upstream::{forward, Upstream};
use crate::security::cors::CorsPolicy;
use crate::security::csrf::CsrfEngine;
use crate::security::headers::HardeningHeaders;
use crate::security::rate_limit::{RateLimitError, RateLimitGate};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("invalid upstream address '{0}'")]
    Upstream(String),
}

/// Everything the pipeline and handlers share.
#[derive(Clone)]
pub struct GatewayState {
    pub csrf: Arc<CsrfEngine>,
    pub rate_limit: RateLimitGate,
    pub cors: Arc<CorsPolicy>,
    pub hardening: Arc<HardeningHeaders>,
    pub nonce: Arc<dyn NonceProvider>,
    pub tenant: Arc<dyn TenantResolver>,
    pub upstream: Option<Upstream>,
}

impl GatewayState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BuildError> {
        let upstream = match config.upstream.address.as_deref() {
            Some(address) => Some(
                Upstream::new(address).map_err(|_| BuildError::Upstream(address.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            csrf: Arc::new(CsrfEngine::new(&config.csrf)),
            rate_limit: RateLimitGate::from_config(&config.rate_limit)?,
            cors: Arc::new(CorsPolicy::new(&config.cors)),
            hardening: Arc::new(HardeningHeaders::new(&config.headers)),
            nonce: Arc::new(StrictCspProvider),
            tenant: Arc::new(SubdomainTenantResolver),
            upstream,
        })
    }

    pub fn with_rate_limit(mut self, gate: RateLimitGate) -> Self {
        self.rate_limit = gate;
        self
    }

    pub fn with_nonce_provider(mut self, provider: Arc<dyn NonceProvider>) -> Self {
        self.nonce = provider;
        self
    }

    pub fn with_tenant_resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.tenant = resolver;
        self
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, BuildError> {
        let state = GatewayState::from_config(&config)?;
        Ok(Self::with_state(config, state))
    }

    pub fn with_state(config: GatewayConfig, state: GatewayState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GatewayConfig, state: GatewayState) -> Router {
        // Outermost first
        let outer = ServiceBuilder::new()
            .layer(set_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        let gateway = Router::new()
            .route(state.csrf.issuance_path(), get(issue_token))
            .fallback(forward)
            .layer(middleware::from_fn_with_state(state.clone(), edge_pipeline))
            .with_state(state);

        // Canonicalization has to wrap routing, so the gateway sits behind
        // an outer router as its fallback.
        Router::new()
            .fallback_service(gateway)
            .layer(middleware::from_fn_with_state(
                RequestLimits::new(&config.limits),
                canonical_request,
            ))
            .layer(outer)
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
