//! Client identification.
//!
//! Forwarding headers are only believed when the TCP peer is a trusted
//! proxy. Otherwise the peer address is the client.
//!
//! Precedence for a trusted peer:
//! 1. right-most `x-forwarded-for` entry that is not itself a trusted proxy
//!    (the left-most entry when every hop is trusted)
//! 2. `x-real-ip`
//! 3. the peer address
//!
//! Without a peer address the request lands in `UNKNOWN_CLIENT`.

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};

/// Shared bucket for requests whose origin cannot be determined.
pub const UNKNOWN_CLIENT: &str = "anonymous";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Networks allowed to speak for the client through forwarding headers.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    nets: Vec<IpNet>,
}

impl TrustedProxies {
    /// Compile proxy entries. Entries that are neither an IP nor a CIDR are
    /// skipped with an error log; validation reports them at startup.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nets = entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                let net = parse_proxy(entry);
                if net.is_none() {
                    tracing::error!(proxy = %entry, "Ignoring unparsable trusted proxy");
                }
                net
            })
            .collect();
        Self { nets }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(&ip))
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

/// `10.0.0.0/8` or a bare address (a single-host network).
pub fn parse_proxy(entry: &str) -> Option<IpNet> {
    let entry = entry.trim();
    entry
        .parse::<IpNet>()
        .ok()
        .or_else(|| entry.parse::<IpAddr>().ok().map(IpNet::from))
}

/// Counting identity for a request; see the module docs for precedence.
pub fn identify(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &TrustedProxies,
) -> String {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return UNKNOWN_CLIENT.to_string();
    };
    if !trusted.contains(peer) {
        return peer.to_string();
    }

    forwarded_client(headers, trusted)
        .or_else(|| {
            headers
                .get(X_REAL_IP)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_ip)
        })
        .unwrap_or(peer)
        .to_string()
}

fn forwarded_client(headers: &HeaderMap, trusted: &TrustedProxies) -> Option<IpAddr> {
    let chain: Vec<IpAddr> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(parse_ip)
        .collect();

    chain
        .iter()
        .rev()
        .find(|ip| !trusted.contains(**ip))
        .or(chain.first())
        .copied()
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
