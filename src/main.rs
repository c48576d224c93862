//! edge-guard
//!
//! Security gateway in front of an HTTP application.
//!
//! ```text
//!     Client ──▶ request id ─▶ trace ─▶ timeout ─▶ edge pipeline ─▶ /api/csrf
//!                                                  │                  │
//!                                                  │ CORS preflight   └▶ upstream
//!                                                  │ nonce + CSP
//!                                                  │ tenant headers
//!                                                  │ rate limit (429)
//!                                                  │ CSRF (403)
//!                                                  └ hardening headers
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use edge_guard::config::{load_config, GatewayConfig};
use edge_guard::lifecycle::{listen_for_shutdown, Shutdown};
use edge_guard::observability::{logging::init_logging, metrics::init_metrics};
use edge_guard::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "edge-guard", version, about = "CSRF and rate-limit gateway")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "EDGE_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&GatewayConfig::default().observability);
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-guard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = ?config.upstream.address,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_local = config.rate_limit.use_local,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    listen_for_shutdown(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
