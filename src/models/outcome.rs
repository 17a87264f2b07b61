use serde::{Deserialize, Serialize};
use strum::AsRefStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivationResult {
    AccessSuccess,
    AccessDenied,
    RevokeSuccess,
    RevokeDenied,
}

/// Why an activation or revocation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DenialReason {
    InvalidInput,
    InvalidPurchase,
    AuthorityUnreachable,
    OwnershipUnproven,
    SlotOccupied,
    StorageFailure,
    Maintenance,
}

/// Response body of the activation endpoint, for grants and denials alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub success: bool,
    pub result: ActivationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Buyer of the purchase code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Support expiry of the purchase code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<String>,
}

impl ActivationResponse {
    pub fn granted(buyer: &str, supported_until: Option<&str>) -> Self {
        Self {
            success: true,
            result: ActivationResult::AccessSuccess,
            reason: None,
            message: None,
            user: Some(buyer.to_string()),
            supported: supported_until.map(String::from),
        }
    }

    pub fn revoked() -> Self {
        Self {
            success: true,
            result: ActivationResult::RevokeSuccess,
            reason: None,
            message: None,
            user: None,
            supported: None,
        }
    }

    pub fn denied(result: ActivationResult, reason: DenialReason, message: String) -> Self {
        Self {
            success: false,
            result,
            reason: Some(reason),
            message: Some(message),
            user: None,
            supported: None,
        }
    }
}
