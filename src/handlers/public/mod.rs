mod activation;
mod status;

pub use activation::*;
pub use status::*;

use axum::{
    Router,
    routing::{get, post},
};

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    let mut activation = Router::new()
        // Legacy clients send GET with query parameters
        .route("/verify-purchase", get(activate).post(activate))
        .route("/activations", post(activate));
    if let Some(layer) = rate_limit::standard_layer(rate_limit.standard_rpm) {
        activation = activation.layer(layer);
    }

    let mut status = Router::new()
        .route("/license/status", get(license_status))
        .route("/status", get(server_status))
        .route("/health", get(health));
    if let Some(layer) = rate_limit::relaxed_layer(rate_limit.relaxed_rpm) {
        status = status.layer(layer);
    }

    activation.merge(status)
}
