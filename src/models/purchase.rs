use serde::{Deserialize, Serialize};

/// Cached answer of the purchase authority for one purchase code.
///
/// Only constructed after the authority response has been validated, so every
/// field a caller relies on is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub purchase_code: String,
    pub product_id: String,
    pub product_name: String,
    pub buyer: String,
    /// License type sold by the authority (e.g. "Regular License")
    pub license_tier: String,
    /// Support expiry as reported by the authority (None = no support period)
    pub supported_until: Option<String>,
    pub cached_at: i64,
}
