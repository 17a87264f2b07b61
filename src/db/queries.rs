use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::domain;
use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{PURCHASE_RECORD_COLS, REGISTRATION_COLS, query_all, query_one};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Registration ids: `sg_reg_{uuid_simple}`.
fn gen_registration_id() -> String {
    format!("sg_reg_{}", Uuid::new_v4().as_simple())
}

// ============ Purchase Records ============

pub fn get_purchase_record(conn: &Connection, purchase_code: &str) -> Result<Option<PurchaseRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM purchase_records WHERE purchase_code = ?1",
            PURCHASE_RECORD_COLS
        ),
        &[&purchase_code],
    )
}

/// Insert the record, or overwrite the existing row for the same purchase code.
pub fn upsert_purchase_record(conn: &Connection, record: &PurchaseRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO purchase_records (purchase_code, product_id, product_name, buyer, license_tier, supported_until, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(purchase_code) DO UPDATE SET
             product_id = excluded.product_id,
             product_name = excluded.product_name,
             buyer = excluded.buyer,
             license_tier = excluded.license_tier,
             supported_until = excluded.supported_until,
             cached_at = excluded.cached_at",
        params![
            &record.purchase_code,
            &record.product_id,
            &record.product_name,
            &record.buyer,
            &record.license_tier,
            &record.supported_until,
            record.cached_at
        ],
    )?;
    Ok(())
}

// ============ Registrations ============

/// Full registration history for a purchase code, revoked rows included.
pub fn list_registrations(conn: &Connection, purchase_code: &str) -> Result<Vec<Registration>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM registrations WHERE purchase_code = ?1 ORDER BY registered_at, id",
            REGISTRATION_COLS
        ),
        &[&purchase_code],
    )
}

pub fn list_active_registrations(conn: &Connection, purchase_code: &str) -> Result<Vec<Registration>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM registrations WHERE purchase_code = ?1 AND revoked = 0 ORDER BY registered_at, id",
            REGISTRATION_COLS
        ),
        &[&purchase_code],
    )
}

fn list_registrations_for_tier(
    conn: &Connection,
    purchase_code: &str,
    environment: Environment,
) -> Result<Vec<Registration>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM registrations WHERE purchase_code = ?1 AND environment = ?2 ORDER BY updated_at DESC, id",
            REGISTRATION_COLS
        ),
        &[&purchase_code, &environment.as_ref()],
    )
}

/// Result of attempting to take a slot for a domain.
#[derive(Debug)]
pub enum SlotAcquisition {
    /// The domain already held an active slot; its metadata was refreshed
    Refreshed(Registration),
    /// The domain's own revoked row was switched back on
    Reactivated(Registration),
    /// A new registration row was created
    Created(Registration),
}

impl SlotAcquisition {
    pub fn registration(&self) -> &Registration {
        match self {
            SlotAcquisition::Refreshed(r)
            | SlotAcquisition::Reactivated(r)
            | SlotAcquisition::Created(r) => r,
        }
    }
}

/// Atomically count the other domains holding a slot and claim one for `claim.domain`.
///
/// Runs in an IMMEDIATE transaction: SQLite takes the write lock when the transaction
/// begins, so two activations for the same purchase code and tier can never both see
/// a free slot. Rows belonging to the requesting domain (in any legacy spelling) are
/// excluded from the count and updated in place rather than duplicated. A domain
/// that already holds an active row is never refused, and any further active rows
/// of that domain are revoked so one remains.
///
/// `slot_limit` of `None` means unlimited.
pub fn acquire_slot_atomic(
    conn: &mut Connection,
    claim: &ClaimSlot,
    slot_limit: Option<u32>,
) -> Result<SlotAcquisition> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let (own, others): (Vec<Registration>, Vec<Registration>) =
        list_registrations_for_tier(&tx, &claim.purchase_code, claim.environment)?
            .into_iter()
            .partition(|r| domain::same_domain(&r.domain, &claim.domain));

    let active_own = own.iter().find(|r| !r.revoked).cloned();

    // A domain that already holds a slot keeps it even if the tier is now over its limit.
    if let (None, Some(limit)) = (&active_own, slot_limit) {
        let occupied = others.iter().filter(|r| !r.revoked).count();
        if occupied >= limit as usize {
            // tx rolls back on drop
            return Err(AppError::SlotOccupied);
        }
    }

    let now = now();

    // Prefer the domain's active row; otherwise the most recently touched revoked one.
    let existing = active_own.or_else(|| own.first().cloned());

    let acquisition = match existing {
        Some(row) => {
            tx.execute(
                "UPDATE registrations
                 SET domain = ?1, server_address = ?2, admin_contact = ?3, supported_until = ?4,
                     revoked = 0, updated_at = ?5
                 WHERE id = ?6",
                params![
                    &claim.domain,
                    &claim.server_address,
                    &claim.admin_contact,
                    &claim.supported_until,
                    now,
                    &row.id
                ],
            )?;

            // Duplicate legacy spellings of the same domain give up their slot.
            for duplicate in own.iter().filter(|r| !r.revoked && r.id != row.id) {
                tx.execute(
                    "UPDATE registrations SET revoked = 1, updated_at = ?1 WHERE id = ?2",
                    params![now, &duplicate.id],
                )?;
            }

            let was_revoked = row.revoked;
            let updated = Registration {
                domain: claim.domain.clone(),
                server_address: claim.server_address.clone(),
                admin_contact: claim.admin_contact.clone(),
                supported_until: claim.supported_until.clone(),
                revoked: false,
                updated_at: now,
                ..row
            };

            if was_revoked {
                SlotAcquisition::Reactivated(updated)
            } else {
                SlotAcquisition::Refreshed(updated)
            }
        }
        None => {
            let id = gen_registration_id();
            tx.execute(
                "INSERT INTO registrations (id, purchase_code, domain, environment, server_address, admin_contact, supported_until, revoked, registered_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    &id,
                    &claim.purchase_code,
                    &claim.domain,
                    claim.environment.as_ref(),
                    &claim.server_address,
                    &claim.admin_contact,
                    &claim.supported_until,
                    now
                ],
            )?;

            SlotAcquisition::Created(Registration {
                id,
                purchase_code: claim.purchase_code.clone(),
                domain: claim.domain.clone(),
                environment: claim.environment,
                server_address: claim.server_address.clone(),
                admin_contact: claim.admin_contact.clone(),
                supported_until: claim.supported_until.clone(),
                revoked: false,
                registered_at: now,
                updated_at: now,
            })
        }
    };

    tx.commit()?;
    Ok(acquisition)
}

/// Mark every registration of `domain` for the purchase code as revoked.
///
/// `environment` of `None` revokes the domain in all tiers. Rows that are already
/// revoked are left untouched. Returns the number of rows switched off.
pub fn revoke_registrations(
    conn: &mut Connection,
    purchase_code: &str,
    domain: &str,
    environment: Option<Environment>,
) -> Result<usize> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let ids: Vec<String> = list_active_registrations(&tx, purchase_code)?
        .into_iter()
        .filter(|r| environment.is_none_or(|env| r.environment == env))
        .filter(|r| domain::same_domain(&r.domain, domain))
        .map(|r| r.id)
        .collect();

    let now = now();
    for id in &ids {
        tx.execute(
            "UPDATE registrations SET revoked = 1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
    }

    tx.commit()?;
    Ok(ids.len())
}
