//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{HeaderMap, Uri},
    Router,
};
use edge_guard::config::GatewayConfig;
use edge_guard::http::{GatewayState, HttpServer};
use edge_guard::lifecycle::Shutdown;
use tokio::net::TcpListener;

/// Config for tests: plain-HTTP cookies, in-process limiter.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.csrf.secure_cookies = false;
    config.rate_limit.use_local = true;
    config.rate_limit.requests = 1_000;
    config.rate_limit.window_ms = 60_000;
    config
}

/// Start a backend that answers every request with 200 and echoes the
/// headers the gateway is expected to add, plus the path it was sent.
pub async fn start_mock_backend() -> SocketAddr {
    let app = Router::new().fallback(|uri: Uri, headers: HeaderMap| async move {
        let nonce = headers
            .get("x-nonce")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        (
            [("x-seen-nonce", nonce), ("x-seen-path", uri.path().to_string())],
            "upstream ok",
        )
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A gateway running on an ephemeral port. Dropping it stops the server.
pub struct TestGateway {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// The value a same-origin browser would send in `Origin`.
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Start the gateway in front of a fresh mock backend.
pub async fn start_gateway(mut config: GatewayConfig) -> TestGateway {
    let backend = start_mock_backend().await;
    config.upstream.address = Some(backend.to_string());
    let state = GatewayState::from_config(&config).unwrap();
    start_gateway_with_state(config, state).await
}

pub async fn start_gateway_with_state(config: GatewayConfig, state: GatewayState) -> TestGateway {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_state(config, state);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the accept loop a moment
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        addr,
        _shutdown: shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Minimal browser-side cookie store, so tests can copy and tamper with it.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    values: BTreeMap<String, String>,
}

impl Cookies {
    /// Take every `Set-Cookie` in `response`.
    pub fn absorb(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let pair = value.split(';').next().unwrap_or("");
            if let Some((name, val)) = pair.split_once('=') {
                self.values.insert(name.trim().to_string(), val.trim().to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn header(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Bootstrap a session: call the issuance endpoint and keep its cookies.
pub async fn fetch_token(
    client: &reqwest::Client,
    gateway: &TestGateway,
    cookies: &mut Cookies,
) -> String {
    let mut request = client.get(gateway.url("/api/csrf"));
    if !cookies.header().is_empty() {
        request = request.header(reqwest::header::COOKIE, cookies.header());
    }
    let response = request.send().await.unwrap();
    assert_eq!(response.status(), 200);
    cookies.absorb(&response);

    let body: serde_json::Value = response.json().await.unwrap();
    body["data"]["token"].as_str().unwrap().to_string()
}

/// A same-origin unsafe request carrying `token` and `cookies`.
pub async fn post_with(
    client: &reqwest::Client,
    gateway: &TestGateway,
    path: &str,
    token: &str,
    cookies: &Cookies,
) -> reqwest::Response {
    client
        .post(gateway.url(path))
        .header(reqwest::header::ORIGIN, gateway.origin())
        .header(reqwest::header::COOKIE, cookies.header())
        .header("x-csrf-token", token)
        .body("{}")
        .send()
        .await
        .unwrap()
}
