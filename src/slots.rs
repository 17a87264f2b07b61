//! Slot manager: decides whether a domain may hold a license slot and records it.

use std::sync::Arc;

use crate::config::LicensePolicy;
use crate::db::{DbPool, queries};
use crate::domain;
use crate::error::{AppError, Result, msg};
use crate::handshake::OwnershipVerifier;
use crate::ledger::PurchaseLedger;
use crate::models::{ClaimSlot, Environment, PurchaseRecord};

pub use crate::db::queries::SlotAcquisition;

/// A validated activation request.
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    pub purchase_code: String,
    /// Raw domain as reported by the client
    pub domain: String,
    pub environment: Environment,
    pub server_address: String,
    pub admin_contact: Option<String>,
}

/// A granted activation: the authenticated purchase and the slot now held.
#[derive(Debug)]
pub struct ActivationGrant {
    pub purchase: PurchaseRecord,
    pub acquisition: SlotAcquisition,
}

#[derive(Debug, Clone)]
pub struct SlotManager {
    db: DbPool,
    ledger: PurchaseLedger,
    verifier: OwnershipVerifier,
    policy: Arc<LicensePolicy>,
}

impl SlotManager {
    pub fn new(
        db: DbPool,
        ledger: PurchaseLedger,
        verifier: OwnershipVerifier,
        policy: Arc<LicensePolicy>,
    ) -> Self {
        Self {
            db,
            ledger,
            verifier,
            policy,
        }
    }

    pub fn policy(&self) -> &LicensePolicy {
        &self.policy
    }

    /// Activate `request.domain` for the purchase code.
    ///
    /// Order: normalize, authenticate the purchase, prove domain ownership, then
    /// count and claim the slot in one serialized transaction. Re-activating a
    /// domain that already holds its slot refreshes the row.
    pub async fn activate(&self, request: &ActivationRequest) -> Result<ActivationGrant> {
        let purchase_code = request.purchase_code.trim();
        let domain_key = domain::normalize(&request.domain);
        require_inputs(purchase_code, &domain_key)?;

        let purchase = self.authenticate(purchase_code).await?;

        if self.verifier.requires_handshake(&domain_key, request.environment)
            && !self.verifier.verify_ownership(&domain_key, purchase_code).await
        {
            tracing::info!(
                purchase_code = %purchase_code,
                domain = %domain_key,
                "Activation refused: ownership unproven"
            );
            return Err(AppError::OwnershipUnproven);
        }

        let claim = ClaimSlot {
            purchase_code: purchase_code.to_string(),
            domain: domain_key,
            environment: request.environment,
            server_address: request.server_address.clone(),
            admin_contact: request.admin_contact.clone().filter(|c| !c.trim().is_empty()),
            supported_until: purchase.supported_until.clone(),
        };
        let slot_limit = self.policy.slot_limit(purchase_code, request.environment);

        let mut conn = self.db.get()?;
        let acquisition = match queries::acquire_slot_atomic(&mut conn, &claim, slot_limit) {
            Ok(acquisition) => acquisition,
            Err(AppError::SlotOccupied) => {
                tracing::info!(
                    purchase_code = %purchase_code,
                    domain = %claim.domain,
                    environment = %claim.environment.as_ref(),
                    "Activation refused: slot held by another domain"
                );
                return Err(AppError::SlotOccupied);
            }
            Err(e) => return Err(e),
        };

        let outcome = match &acquisition {
            SlotAcquisition::Created(_) => "created",
            SlotAcquisition::Reactivated(_) => "reactivated",
            SlotAcquisition::Refreshed(_) => "refreshed",
        };
        tracing::info!(
            purchase_code = %purchase_code,
            domain = %claim.domain,
            environment = %claim.environment.as_ref(),
            server_address = %claim.server_address,
            outcome,
            "Activation granted"
        );

        Ok(ActivationGrant {
            purchase,
            acquisition,
        })
    }

    /// Release the slot(s) `domain` holds for the purchase code.
    ///
    /// The purchase must authenticate, as for activation. `environment` of `None`
    /// releases the domain in every tier. Releasing a domain that holds nothing is
    /// not an error; the returned count is then 0.
    pub async fn deactivate(
        &self,
        purchase_code: &str,
        domain: &str,
        environment: Option<Environment>,
    ) -> Result<usize> {
        let purchase_code = purchase_code.trim();
        let domain_key = domain::normalize(domain);
        require_inputs(purchase_code, &domain_key)?;

        self.authenticate(purchase_code).await?;

        let mut conn = self.db.get()?;
        let revoked =
            queries::revoke_registrations(&mut conn, purchase_code, &domain_key, environment)?;

        tracing::info!(
            purchase_code = %purchase_code,
            domain = %domain_key,
            revoked,
            "Deactivation processed"
        );

        Ok(revoked)
    }

    /// Authenticate the purchase and apply the acceptance policy.
    async fn authenticate(&self, purchase_code: &str) -> Result<PurchaseRecord> {
        if self.policy.is_blocked(purchase_code) {
            tracing::info!(purchase_code = %purchase_code, "Refused blocked purchase code");
            return Err(AppError::InvalidPurchase);
        }

        let purchase = self
            .ledger
            .resolve(&self.db, purchase_code, false)
            .await?
            .ok_or(AppError::InvalidPurchase)?;

        if !self.policy.is_product_allowed(&purchase.product_id) {
            tracing::info!(
                purchase_code = %purchase_code,
                product_id = %purchase.product_id,
                "Refused purchase of a product this server does not license"
            );
            return Err(AppError::InvalidPurchase);
        }

        Ok(purchase)
    }
}

fn require_inputs(purchase_code: &str, domain_key: &str) -> Result<()> {
    if purchase_code.is_empty() {
        return Err(AppError::InvalidInput(msg::PURCHASE_CODE_EMPTY.into()));
    }
    if domain_key.is_empty() {
        return Err(AppError::InvalidInput(msg::DOMAIN_EMPTY.into()));
    }
    Ok(())
}
