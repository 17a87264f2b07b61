//! Network identity matching between a requesting address and a stored one.
//!
//! Hosting providers hand out dynamic addresses, so an exact match is too strict.
//! IPv4 addresses within [`IPV4_TOLERANCE`] of each other count as the same server,
//! IPv6 addresses match on their /64 routing prefix.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Maximum numeric distance between two IPv4 addresses of the same server.
pub const IPV4_TOLERANCE: u32 = 20;

/// Decide whether `requesting` and `stored` should be treated as the same server.
///
/// Mixed address families and unparsable input never match.
pub fn same_origin(requesting: &str, stored: &str) -> bool {
    let requesting = requesting.trim();
    let stored = stored.trim();

    if !requesting.is_empty() && requesting == stored {
        return true;
    }

    match (parse(requesting), parse(stored)) {
        (Some(IpAddr::V4(a)), Some(IpAddr::V4(b))) => ipv4_within_tolerance(a, b),
        (Some(IpAddr::V6(a)), Some(IpAddr::V6(b))) => same_ipv6_prefix(a, b),
        _ => false,
    }
}

fn parse(addr: &str) -> Option<IpAddr> {
    // Stored addresses occasionally carry brackets from URL-style formatting.
    let addr = addr.trim_start_matches('[').trim_end_matches(']');
    addr.parse::<IpAddr>().ok()
}

fn ipv4_within_tolerance(a: Ipv4Addr, b: Ipv4Addr) -> bool {
    u32::from(a).abs_diff(u32::from(b)) <= IPV4_TOLERANCE
}

fn same_ipv6_prefix(a: Ipv6Addr, b: Ipv6Addr) -> bool {
    (u128::from(a) >> 64) == (u128::from(b) >> 64)
}
