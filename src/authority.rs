//! Client for the marketplace API that sold the purchase codes.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::AuthorityConfig;
use crate::error::{AppError, Result};
use crate::models::PurchaseRecord;

#[derive(Debug, Deserialize)]
struct SaleResponse {
    item: Option<SaleItem>,
    buyer: Option<String>,
    license: Option<String>,
    supported_until: Option<String>,
    /// Set instead of the sale fields when the code is unknown
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SaleItem {
    /// Numeric on the wire, but accepted as a string too
    id: Option<serde_json::Value>,
    name: Option<String>,
}

/// A sale as reported by the authority, before validation.
#[derive(Debug, Clone)]
pub struct AuthoritySale {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub buyer: Option<String>,
    pub license_tier: Option<String>,
    pub supported_until: Option<String>,
}

impl AuthoritySale {
    /// Validate into a cacheable record. `None` if the sale lacks a usable product identity.
    pub fn into_record(self, purchase_code: &str, cached_at: i64) -> Option<PurchaseRecord> {
        let product_id = self.product_id.filter(|id| !id.is_empty())?;
        let product_name = self.product_name.filter(|name| !name.is_empty())?;

        Some(PurchaseRecord {
            purchase_code: purchase_code.to_string(),
            product_id,
            product_name,
            buyer: self.buyer.unwrap_or_default(),
            license_tier: self.license_tier.unwrap_or_default(),
            supported_until: self.supported_until.filter(|s| !s.is_empty()),
            cached_at,
        })
    }
}

#[derive(Debug, Clone)]
pub enum AuthorityLookup {
    Found(AuthoritySale),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct AuthorityClient {
    client: Client,
    base_url: String,
    token: String,
}

impl AuthorityClient {
    pub fn new(config: &AuthorityConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Look up the sale behind a purchase code.
    ///
    /// Timeouts, transport errors, 5xx answers and unreadable bodies are
    /// `AuthorityUnreachable`; an unknown code is `NotFound`.
    pub async fn lookup(&self, purchase_code: &str) -> Result<AuthorityLookup> {
        let response = self
            .client
            .get(format!("{}/v3/market/author/sale", self.base_url))
            .query(&[("code", purchase_code)])
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::AuthorityUnreachable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(AuthorityLookup::NotFound);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::AuthorityUnreachable(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        let sale: SaleResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthorityUnreachable(format!("unreadable response: {}", e)))?;

        if sale.error.is_some() {
            return Ok(AuthorityLookup::NotFound);
        }

        let (product_id, product_name) = match sale.item {
            Some(item) => (item.id.and_then(id_to_string), item.name),
            None => (None, None),
        };

        Ok(AuthorityLookup::Found(AuthoritySale {
            product_id,
            product_name,
            buyer: sale.buyer,
            license_tier: sale.license,
            supported_until: sale.supported_until,
        }))
    }
}

fn id_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}
