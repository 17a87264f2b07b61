//! Purchase ledger tests against a mocked purchase authority.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use slotguard::error::AppError;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_resolve_fetches_and_caches() {
    let authority = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/market/author/sale"))
        .and(query_param("code", "ABC123"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sale_body()))
        .expect(1)
        .mount(&authority)
        .await;

    let (pool, _dir) = setup_test_pool();
    let ledger = test_ledger(&authority);

    let record = ledger
        .resolve(&pool, "ABC123", false)
        .await
        .expect("lookup should succeed")
        .expect("code should be known");
    assert_eq!(record.product_id, PRODUCT_ID);
    assert_eq!(record.product_name, PRODUCT_NAME);
    assert_eq!(record.buyer, BUYER);
    assert_eq!(record.supported_until.as_deref(), Some(SUPPORTED_UNTIL));

    // Second call is served from the cache; the mock expects exactly one hit.
    let cached = ledger.resolve(&pool, "ABC123", false).await.unwrap().unwrap();
    assert_eq!(cached, record);

    let conn = pool.get().unwrap();
    assert!(queries::get_purchase_record(&conn, "ABC123").unwrap().is_some());
}

#[tokio::test]
async fn test_force_refresh_bypasses_cache() {
    let authority = MockServer::start().await;
    let mut body = sale_body();
    body["buyer"] = json!("jane.renamed");
    mount_sale(&authority, "ABC123", body).await;

    let (pool, _dir) = setup_test_pool();
    {
        let conn = pool.get().unwrap();
        seed_purchase(&conn, "ABC123");
    }
    let ledger = test_ledger(&authority);

    let cached = ledger.resolve(&pool, "ABC123", false).await.unwrap().unwrap();
    assert_eq!(cached.buyer, BUYER, "fresh cache should be used without forcing");

    let refreshed = ledger.resolve(&pool, "ABC123", true).await.unwrap().unwrap();
    assert_eq!(refreshed.buyer, "jane.renamed");

    let conn = pool.get().unwrap();
    let stored = queries::get_purchase_record(&conn, "ABC123").unwrap().unwrap();
    assert_eq!(stored.buyer, "jane.renamed", "refresh should overwrite the cached row");
}

#[tokio::test]
async fn test_expired_cache_is_refetched() {
    let authority = MockServer::start().await;
    mount_sale(&authority, "ABC123", sale_body()).await;

    let (pool, _dir) = setup_test_pool();
    {
        let conn = pool.get().unwrap();
        let stale = PurchaseRecord {
            buyer: "stale".to_string(),
            cached_at: now() - 10 * 86_400,
            ..test_purchase("ABC123")
        };
        queries::upsert_purchase_record(&conn, &stale).unwrap();
    }

    let client = AuthorityClient::new(&authority_config(&authority)).unwrap();
    let ledger = PurchaseLedger::new(client, Some(7));

    let record = ledger.resolve(&pool, "ABC123", false).await.unwrap().unwrap();
    assert_eq!(record.buyer, BUYER, "records older than the TTL should be refetched");
}

#[tokio::test]
async fn test_unknown_code_is_none_and_not_cached() {
    let authority = MockServer::start().await;
    mount_unknown_code(&authority, "NOPE").await;

    let (pool, _dir) = setup_test_pool();
    let ledger = test_ledger(&authority);

    let record = ledger.resolve(&pool, "NOPE", false).await.unwrap();
    assert!(record.is_none());

    let conn = pool.get().unwrap();
    assert!(queries::get_purchase_record(&conn, "NOPE").unwrap().is_none());
}

#[tokio::test]
async fn test_sale_without_item_is_none() {
    let authority = MockServer::start().await;
    mount_sale(
        &authority,
        "ABC123",
        json!({ "buyer": BUYER, "license": "Regular License", "item": { "name": PRODUCT_NAME } }),
    )
    .await;

    let (pool, _dir) = setup_test_pool();
    let ledger = test_ledger(&authority);

    let record = ledger.resolve(&pool, "ABC123", false).await.unwrap();
    assert!(record.is_none(), "a sale without item id is not a usable purchase");
}

#[tokio::test]
async fn test_server_error_is_authority_unreachable() {
    let authority = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/market/author/sale"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&authority)
        .await;

    let (pool, _dir) = setup_test_pool();
    let ledger = test_ledger(&authority);

    let err = ledger.resolve(&pool, "ABC123", false).await.unwrap_err();
    assert!(matches!(err, AppError::AuthorityUnreachable(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_authority_unreachable() {
    let authority = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/market/author/sale"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sale_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&authority)
        .await;

    let (pool, _dir) = setup_test_pool();
    let config = AuthorityConfig {
        timeout_secs: 1,
        ..authority_config(&authority)
    };
    let ledger = PurchaseLedger::new(AuthorityClient::new(&config).unwrap(), None);

    let err = ledger.resolve(&pool, "ABC123", false).await.unwrap_err();
    assert!(matches!(err, AppError::AuthorityUnreachable(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_string_product_id_is_accepted() {
    let authority = MockServer::start().await;
    let mut body = sale_body();
    body["item"]["id"] = json!("42");
    mount_sale(&authority, "ABC123", body).await;

    let (pool, _dir) = setup_test_pool();
    let record = test_ledger(&authority)
        .resolve(&pool, "ABC123", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.product_id, PRODUCT_ID);
}
