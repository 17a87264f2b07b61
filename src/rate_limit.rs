//! Rate limiting configuration for public endpoints.
//!
//! Rate limits are applied per-IP address. Activation requests are the
//! expensive ones: each may call the purchase authority and the customer's
//! handshake endpoint.
//!
//! Tiers:
//! - Standard: /verify-purchase, /activations
//! - Relaxed: /license/status, /status, /health
//!
//! Configure via environment variables:
//! - RATE_LIMIT_STANDARD_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 120)
//!
//! A value of 0 disables the tier's limiter.

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer, or `None` when the tier is disabled.
fn create_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    // Replenish one request per period; allow the full minute's budget as a burst.
    let period_ms = (60_000 / requests_per_minute as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(period_ms))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}

/// Rate limiter for the activation endpoints.
pub fn standard_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    create_layer(requests_per_minute)
}

/// Rate limiter for read-only endpoints (status, health).
pub fn relaxed_layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    create_layer(requests_per_minute)
}
