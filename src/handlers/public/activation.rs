//! Activation endpoint.
//!
//! A deployed instance reports its purchase code and domain and either takes a
//! slot or (with `revoke_domain`) gives its slot back. Parameters may arrive in
//! the query string, a urlencoded form or a JSON body.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use serde::{Deserialize, Deserializer};

use crate::config::parse_flag;
use crate::db::AppState;
use crate::error::{AppError, Denial};
use crate::extractors::Params;
use crate::models::{ActivationResponse, Environment};
use crate::slots::ActivationRequest;
use crate::util::client_address;

#[derive(Debug, Deserialize)]
pub struct ActivationParams {
    #[serde(default)]
    pub purchase_code: String,
    #[serde(default)]
    pub domain: String,
    /// `production` (default) or `development`
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    /// Release the slot instead of taking it
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub revoke_domain: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Accepts `true`/`false`, `1`/`0` and their string spellings.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(value) => Ok(value),
        FlagValue::Int(value) => Ok(value != 0),
        FlagValue::Text(value) => parse_flag(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean: {}", value))),
    }
}

/// Parse the environment parameter. Absent or blank means "not specified".
fn parse_environment(raw: Option<&str>) -> Result<Option<Environment>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<Environment>()
            .map(Some)
            .map_err(|_| AppError::InvalidInput(format!("Unknown environment: {}", value))),
    }
}

/// GET|POST /verify-purchase, POST /activations
///
/// Grants report the buyer and support expiry; denials carry a reason code.
/// Revocation without an environment releases the domain in every tier.
pub async fn activate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Params(params): Params<ActivationParams>,
) -> Result<Json<ActivationResponse>, Denial> {
    let revoke = params.revoke_domain;
    let deny = |error: AppError| {
        if revoke {
            Denial::revoke(error)
        } else {
            Denial::from(error)
        }
    };

    if state.maintenance_mode {
        return Err(deny(AppError::Maintenance));
    }

    let environment = parse_environment(params.environment.as_deref()).map_err(deny)?;

    if revoke {
        state
            .slots
            .deactivate(&params.purchase_code, &params.domain, environment)
            .await
            .map_err(deny)?;
        return Ok(Json(ActivationResponse::revoked()));
    }

    let request = ActivationRequest {
        purchase_code: params.purchase_code,
        domain: params.domain,
        environment: environment.unwrap_or_default(),
        server_address: client_address(&headers, peer, state.trust_proxy_headers),
        admin_contact: params.admin_email,
    };

    let grant = state.slots.activate(&request).await?;

    Ok(Json(ActivationResponse::granted(
        &grant.purchase.buyer,
        grant.purchase.supported_until.as_deref(),
    )))
}
