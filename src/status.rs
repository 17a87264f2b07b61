//! Read-side license check used to gate downloads and update feeds.
//!
//! Lower trust than activation: answers from stored registrations only and
//! never contacts the purchase authority.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::config::LicensePolicy;
use crate::db::{DbPool, queries};
use crate::domain;
use crate::error::{Result, msg};
use crate::network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusReason {
    Registered,
    NotRegistered,
    WrongServer,
    InvalidPurchase,
    MissingPurchaseCode,
    /// The registrations could not be read
    StorageFailure,
}

impl StatusReason {
    pub fn message(self) -> &'static str {
        match self {
            StatusReason::Registered => msg::VALID_SERVER,
            StatusReason::NotRegistered => msg::VALID_NO_SERVER,
            StatusReason::WrongServer => msg::INVALID_WRONG_SERVER,
            StatusReason::InvalidPurchase => msg::INVALID,
            StatusReason::MissingPurchaseCode => msg::PURCHASE_CODE_EMPTY,
            StatusReason::StorageFailure => msg::STORAGE_FAILURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenseStatus {
    pub allowed: bool,
    pub reason: StatusReason,
}

impl LicenseStatus {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: StatusReason::Registered,
        }
    }

    fn denied(reason: StatusReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusEvaluator {
    db: DbPool,
    policy: Arc<LicensePolicy>,
}

impl StatusEvaluator {
    pub fn new(db: DbPool, policy: Arc<LicensePolicy>) -> Self {
        Self { db, policy }
    }

    /// Whether the caller holds an active registration for the purchase code.
    pub fn is_registered(
        &self,
        domain: Option<&str>,
        address: &str,
        purchase_code: &str,
    ) -> Result<bool> {
        Ok(self.evaluate(purchase_code, domain, address)?.allowed)
    }

    /// Evaluate the caller against the stored registrations.
    ///
    /// With a domain, any active row for the same domain counts. Without one,
    /// the caller's address is matched against the rows' server addresses.
    pub fn evaluate(
        &self,
        purchase_code: &str,
        domain: Option<&str>,
        address: &str,
    ) -> Result<LicenseStatus> {
        let purchase_code = purchase_code.trim();
        if purchase_code.is_empty() {
            return Ok(LicenseStatus::denied(StatusReason::MissingPurchaseCode));
        }
        if self.policy.is_blocked(purchase_code) {
            return Ok(LicenseStatus::denied(StatusReason::InvalidPurchase));
        }
        if self.policy.is_trusted(purchase_code) {
            return Ok(LicenseStatus::allowed());
        }

        let conn = self.db.get()?;
        let registrations = queries::list_active_registrations(&conn, purchase_code)?;

        if registrations.is_empty() {
            // Only codes that once authenticated have a cached purchase record.
            let known = queries::get_purchase_record(&conn, purchase_code)?.is_some();
            let reason = if known {
                StatusReason::NotRegistered
            } else {
                StatusReason::InvalidPurchase
            };
            return Ok(LicenseStatus::denied(reason));
        }

        let matched = match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => registrations
                .iter()
                .any(|r| domain::same_domain(&r.domain, domain)),
            None => registrations
                .iter()
                .any(|r| network::same_origin(address, &r.server_address)),
        };

        Ok(if matched {
            LicenseStatus::allowed()
        } else {
            LicenseStatus::denied(StatusReason::WrongServer)
        })
    }
}
