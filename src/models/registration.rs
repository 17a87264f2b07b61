use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Environment tier of a registration. Each tier has its own slot limit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// One slot held by a domain for a purchase code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub purchase_code: String,
    /// Normalized domain key (legacy rows may still carry a scheme prefix)
    pub domain: String,
    pub environment: Environment,
    pub server_address: String,
    pub admin_contact: Option<String>,
    /// Copied from the purchase record at registration time
    pub supported_until: Option<String>,
    pub revoked: bool,
    pub registered_at: i64,
    pub updated_at: i64,
}

/// Fields written when a domain takes (or refreshes) its slot.
#[derive(Debug, Clone)]
pub struct ClaimSlot {
    pub purchase_code: String,
    /// Must already be normalized
    pub domain: String,
    pub environment: Environment,
    pub server_address: String,
    pub admin_contact: Option<String>,
    pub supported_until: Option<String>,
}
