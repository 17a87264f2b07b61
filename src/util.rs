//! Shared request helpers.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Address of the requesting server.
///
/// The transport peer address is authoritative. `x-forwarded-for` (first hop)
/// and `x-real-ip` are only consulted when `trust_proxy_headers` is set, since
/// any client can send them.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers && let Some(forwarded) = forwarded_address(headers) {
        return forwarded;
    }

    // IPv4 clients on a dual-stack listener show up as ::ffff:a.b.c.d
    peer.ip().to_canonical().to_string()
}

fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    forwarded_for.or_else(real_ip).map(String::from)
}
