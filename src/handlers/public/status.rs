use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::extractors::Query;
use crate::status::{LicenseStatus, StatusReason};
use crate::util::client_address;

#[derive(Debug, Deserialize)]
pub struct LicenseStatusQuery {
    #[serde(default)]
    pub purchase_code: String,
    /// When absent, the caller is matched by address instead
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseStatusResponse {
    pub allowed: bool,
    /// Human-readable explanation
    pub reason: String,
    pub code: StatusReason,
}

/// GET /license/status
///
/// Gate for downloads and update feeds. Reads stored registrations only.
/// Every answer, including a storage failure, has the `{allowed, reason, code}` shape.
pub async fn license_status(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<LicenseStatusQuery>,
) -> (StatusCode, Json<LicenseStatusResponse>) {
    let address = client_address(&headers, peer, state.trust_proxy_headers);

    let evaluated = state
        .status
        .evaluate(&query.purchase_code, query.domain.as_deref(), &address);
    let (status_code, status) = match evaluated {
        Ok(status) => (StatusCode::OK, status),
        Err(e) => {
            tracing::error!(
                purchase_code = %query.purchase_code,
                "License status lookup failed: {}",
                e
            );
            let failed = LicenseStatus {
                allowed: false,
                reason: StatusReason::StorageFailure,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, failed)
        }
    };

    tracing::debug!(
        purchase_code = %query.purchase_code,
        allowed = status.allowed,
        reason = %status.reason.as_ref(),
        "License status evaluated"
    );

    (
        status_code,
        Json(LicenseStatusResponse {
            allowed: status.allowed,
            reason: status.reason.message().to_string(),
            code: status.reason,
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerStatusResponse {
    pub server_status: String,
}

/// GET /status
pub async fn server_status(State(state): State<AppState>) -> Json<ServerStatusResponse> {
    let server_status = if state.maintenance_mode {
        "maintenance"
    } else {
        "running"
    };
    Json(ServerStatusResponse {
        server_status: server_status.to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
