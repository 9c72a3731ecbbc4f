use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::AppState;

/// Caller's network address, used as the rate limit key.
///
/// Taken from `X-Forwarded-For`, counting `trusted_proxy_hops` entries from
/// the right, since only what our own proxies appended can be believed.
/// Falls back to the socket peer, else `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            peer,
            state.trusted_proxy_hops,
        )))
    }
}

pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_hops: usize,
) -> String {
    forwarded_hop(headers, trusted_hops)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// "spoofed, 203.0.113.7, 10.0.0.1" with 2 hops -> "203.0.113.7"
fn forwarded_hop(headers: &HeaderMap, trusted_hops: usize) -> Option<String> {
    if trusted_hops == 0 {
        return None;
    }

    // proxies may send several X-Forwarded-For lines; they form one list
    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect();

    let index = hops.len().checked_sub(trusted_hops)?;
    hops.get(index)
        .filter(|ip| !ip.is_empty())
        .map(|ip| ip.to_string())
}
