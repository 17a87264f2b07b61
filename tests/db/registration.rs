//! Slot acquisition and revocation tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use slotguard::db::queries::SlotAcquisition;
use slotguard::error::AppError;

const CODE: &str = "ABC123";

// ============ Acquisition ============

#[test]
fn test_first_activation_creates_registration() {
    let mut conn = setup_test_db();

    let acquisition = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .expect("first activation should succeed");

    assert!(matches!(acquisition, SlotAcquisition::Created(_)));
    let registration = acquisition.registration();
    assert!(registration.id.starts_with("sg_reg_"), "ids should be prefixed");
    assert_eq!(registration.domain, "shop.example.com");
    assert_eq!(registration.environment, Environment::Production);
    assert!(!registration.revoked);
    assert_eq!(registration.supported_until.as_deref(), Some(SUPPORTED_UNTIL));
}

#[test]
fn test_repeat_activation_is_idempotent() {
    let mut conn = setup_test_db();
    let first = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();

    let mut again = claim(CODE, "shop.example.com", Environment::Production);
    again.server_address = "203.0.113.11".to_string();
    let second = queries::acquire_slot_atomic(&mut conn, &again, Some(1))
        .expect("re-activating the same domain should succeed");

    assert!(matches!(second, SlotAcquisition::Refreshed(_)));
    assert_eq!(second.registration().id, first.registration().id);

    let rows = queries::list_registrations(&conn, CODE).unwrap();
    assert_eq!(rows.len(), 1, "re-activation must not duplicate the row");
    assert_eq!(rows[0].server_address, "203.0.113.11", "metadata should be refreshed");
}

#[test]
fn test_second_domain_is_refused_at_limit() {
    let mut conn = setup_test_db();
    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();

    let result = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "other.example.com", Environment::Production),
        Some(1),
    );
    assert!(
        matches!(result, Err(AppError::SlotOccupied)),
        "second domain should be refused, got {:?}",
        result
    );

    let active = queries::list_active_registrations(&conn, CODE).unwrap();
    assert_eq!(active.len(), 1, "refused activation must not write");
    assert_eq!(active[0].domain, "shop.example.com");
}

#[test]
fn test_tiers_have_separate_slots() {
    let mut conn = setup_test_db();
    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();

    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "staging.example.com", Environment::Development),
        Some(1),
    )
    .expect("development tier should have its own slot");

    assert_eq!(queries::list_active_registrations(&conn, CODE).unwrap().len(), 2);
}

#[test]
fn test_higher_limit_allows_more_domains() {
    let mut conn = setup_test_db();
    for domain in ["a.example.com", "b.example.com"] {
        queries::acquire_slot_atomic(
            &mut conn,
            &claim(CODE, domain, Environment::Production),
            Some(2),
        )
        .expect("both domains fit within a limit of 2");
    }

    let third = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "c.example.com", Environment::Production),
        Some(2),
    );
    assert!(matches!(third, Err(AppError::SlotOccupied)));
}

#[test]
fn test_unlimited_slots() {
    let mut conn = setup_test_db();
    for i in 0..5 {
        queries::acquire_slot_atomic(
            &mut conn,
            &claim(CODE, &format!("site{}.example.com", i), Environment::Production),
            None,
        )
        .expect("no limit should never refuse");
    }
    assert_eq!(queries::list_active_registrations(&conn, CODE).unwrap().len(), 5);
}

#[test]
fn test_codes_do_not_share_slots() {
    let mut conn = setup_test_db();
    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();

    queries::acquire_slot_atomic(
        &mut conn,
        &claim("XYZ789", "other.example.com", Environment::Production),
        Some(1),
    )
    .expect("a different purchase code has its own slot");
}

// ============ Legacy rows ============

#[test]
fn test_legacy_prefixed_row_is_updated_not_duplicated() {
    let mut conn = setup_test_db();
    conn.execute(
        "INSERT INTO registrations (id, purchase_code, domain, environment, server_address, revoked, registered_at, updated_at)
         VALUES ('legacy_1', ?1, 'https://www.shop.example.com/', 'production', '203.0.113.10', 0, 1, 1)",
        [CODE],
    )
    .unwrap();

    let acquisition = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .expect("the legacy row belongs to the same domain");

    assert!(matches!(acquisition, SlotAcquisition::Refreshed(_)));
    assert_eq!(acquisition.registration().id, "legacy_1");

    let rows = queries::list_registrations(&conn, CODE).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].domain, "shop.example.com", "row should be rewritten normalized");
}

#[test]
fn test_duplicate_legacy_rows_collapse_to_one_active() {
    let mut conn = setup_test_db();
    conn.execute_batch(
        "INSERT INTO registrations (id, purchase_code, domain, environment, server_address, revoked, registered_at, updated_at)
         VALUES ('legacy_1', 'ABC123', 'https://shop.example.com', 'production', '203.0.113.10', 0, 1, 2);
         INSERT INTO registrations (id, purchase_code, domain, environment, server_address, revoked, registered_at, updated_at)
         VALUES ('legacy_2', 'ABC123', 'shop.example.com', 'production', '203.0.113.10', 0, 1, 1);",
    )
    .unwrap();

    for _ in 0..2 {
        queries::acquire_slot_atomic(
            &mut conn,
            &claim(CODE, "shop.example.com", Environment::Production),
            Some(1),
        )
        .expect("both legacy rows belong to the requesting domain");
    }

    let active = queries::list_active_registrations(&conn, CODE).unwrap();
    assert_eq!(active.len(), 1, "exactly one active row should remain for the domain");
    assert_eq!(active[0].domain, "shop.example.com");

    let rows = queries::list_registrations(&conn, CODE).unwrap();
    assert_eq!(rows.len(), 2, "duplicates are revoked, not deleted");
}

#[test]
fn test_registered_domain_keeps_slot_when_tier_is_over_limit() {
    let mut conn = setup_test_db();
    for domain in ["a.example.com", "b.example.com"] {
        queries::acquire_slot_atomic(
            &mut conn,
            &claim(CODE, domain, Environment::Production),
            None,
        )
        .unwrap();
    }

    // Limit lowered after both domains registered
    let acquisition = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "a.example.com", Environment::Production),
        Some(1),
    )
    .expect("a registered domain may always refresh its own slot");
    assert!(matches!(acquisition, SlotAcquisition::Refreshed(_)));

    let result = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "c.example.com", Environment::Production),
        Some(1),
    );
    assert!(matches!(result, Err(AppError::SlotOccupied)));

    let active = queries::list_active_registrations(&conn, CODE).unwrap();
    assert_eq!(active.len(), 2);
}

#[test]
fn test_legacy_row_of_other_domain_still_counts() {
    let mut conn = setup_test_db();
    conn.execute(
        "INSERT INTO registrations (id, purchase_code, domain, environment, server_address, revoked, registered_at, updated_at)
         VALUES ('legacy_1', ?1, 'http://shop.example.com', 'production', '203.0.113.10', 0, 1, 1)",
        [CODE],
    )
    .unwrap();

    let result = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "other.example.com", Environment::Production),
        Some(1),
    );
    assert!(matches!(result, Err(AppError::SlotOccupied)));
}

// ============ Revocation ============

#[test]
fn test_revoke_then_reactivate() {
    let mut conn = setup_test_db();
    let created = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();

    let revoked = queries::revoke_registrations(&mut conn, CODE, "https://shop.example.com/", None)
        .expect("revoke should succeed");
    assert_eq!(revoked, 1);
    assert!(queries::list_active_registrations(&conn, CODE).unwrap().is_empty());

    // The freed slot can go to another domain...
    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "other.example.com", Environment::Production),
        Some(1),
    )
    .expect("freed slot should be available");
    queries::revoke_registrations(&mut conn, CODE, "other.example.com", None).unwrap();

    // ...and the original domain gets its own row back.
    let reactivated = queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .expect("reactivation should succeed");
    assert!(matches!(reactivated, SlotAcquisition::Reactivated(_)));
    assert_eq!(reactivated.registration().id, created.registration().id);

    let history = queries::list_registrations(&conn, CODE).unwrap();
    assert_eq!(history.len(), 2, "revoked rows are kept as history");
}

#[test]
fn test_revoke_is_idempotent() {
    let mut conn = setup_test_db();
    assert_eq!(
        queries::revoke_registrations(&mut conn, CODE, "shop.example.com", None).unwrap(),
        0,
        "revoking a domain with no registration is a no-op"
    );

    queries::acquire_slot_atomic(
        &mut conn,
        &claim(CODE, "shop.example.com", Environment::Production),
        Some(1),
    )
    .unwrap();
    assert_eq!(
        queries::revoke_registrations(&mut conn, CODE, "shop.example.com", None).unwrap(),
        1
    );
    assert_eq!(
        queries::revoke_registrations(&mut conn, CODE, "shop.example.com", None).unwrap(),
        0,
        "already revoked rows are left alone"
    );
}

#[test]
fn test_revoke_limited_to_environment() {
    let mut conn = setup_test_db();
    for environment in [Environment::Production, Environment::Development] {
        queries::acquire_slot_atomic(
            &mut conn,
            &claim(CODE, "shop.example.com", environment),
            Some(1),
        )
        .unwrap();
    }

    let revoked = queries::revoke_registrations(
        &mut conn,
        CODE,
        "shop.example.com",
        Some(Environment::Development),
    )
    .unwrap();
    assert_eq!(revoked, 1);

    let active = queries::list_active_registrations(&conn, CODE).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].environment, Environment::Production);
}
