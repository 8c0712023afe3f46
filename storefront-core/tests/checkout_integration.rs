//! Integration tests for checkout flows.

mod common;

use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;
use storefront_core::checkout::{CheckoutAttemptCoordinator, OrderSubmitter, ATTEMPT_STORAGE_KEY};
use storefront_core::storage::{FileSessionStore, InMemorySessionStore, SessionStore};
use storefront_core::{ApiError, StorefrontError};

fn submitter(
    server: &mockito::Server,
    store: Arc<dyn SessionStore>,
) -> (OrderSubmitter, Arc<CheckoutAttemptCoordinator>) {
    let coordinator = Arc::new(CheckoutAttemptCoordinator::new(store));
    let submitter = OrderSubmitter::new(common::gateway(server), Arc::clone(&coordinator));
    (submitter, coordinator)
}

#[tokio::test]
async fn test_submits_one_order_per_merchant_with_distinct_keys() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(InMemorySessionStore::new());
    let (submitter, coordinator) = submitter(&server, store.clone());

    let intent = common::multi_merchant_intent();
    let prepared = coordinator.prepare(&intent).unwrap();
    let seed = coordinator.current_attempt().unwrap().unwrap().seed;

    let mut mocks = Vec::new();
    for (index, merchant) in [json!("m1"), json!("m2"), json!(null)].into_iter().enumerate() {
        mocks.push(
            server
                .mock("POST", "/orders")
                .match_header("idempotency-key", format!("{seed}:{index}").as_str())
                .match_body(Matcher::PartialJson(json!({
                    "merchantId": merchant,
                    "paymentMethod": "KHQR",
                })))
                .with_status(201)
                .with_body(format!(r#"{{"orderId": "o{index}"}}"#))
                .expect(1)
                .create_async()
                .await,
        );
    }

    let orders = submitter.submit_prepared(&intent, &prepared).await.unwrap();
    submitter.complete().unwrap();

    let keys: Vec<_> = orders.iter().map(|o| o.idempotency_key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            format!("{seed}:0"),
            format!("{seed}:1"),
            format!("{seed}:2")
        ]
    );
    assert_eq!(orders[2].merchant_key, "unknown-merchant");
    assert_eq!(orders[0].response["orderId"], "o0");
    assert_eq!(store.get(ATTEMPT_STORAGE_KEY).unwrap(), None);
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_retry_after_failure_reuses_keys() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(InMemorySessionStore::new());
    let (submitter, coordinator) = submitter(&server, store.clone());
    let intent = common::multi_merchant_intent();

    let failing = server
        .mock("POST", "/orders")
        .with_status(422)
        .with_body(r#"{"message": "address not deliverable"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = submitter.submit(&intent).await.unwrap_err();
    assert!(matches!(
        err,
        StorefrontError::Api(ApiError::ValidationFailed { ref message }) if message == "address not deliverable"
    ));
    failing.assert_async().await;
    failing.remove_async().await;

    let first_seed = coordinator.current_attempt().unwrap().unwrap().seed;
    let accepted = server
        .mock("POST", "/orders")
        .match_header(
            "idempotency-key",
            Matcher::Regex(format!("^{first_seed}:[0-2]$")),
        )
        .with_status(201)
        .with_body("{}")
        .expect(3)
        .create_async()
        .await;

    let orders = submitter.submit(&intent).await.unwrap();

    assert_eq!(orders.len(), 3);
    assert!(coordinator.current_attempt().unwrap().is_none());
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_changed_cart_rotates_keys() {
    let server = mockito::Server::new_async().await;
    let (_submitter, coordinator) = submitter(&server, Arc::new(InMemorySessionStore::new()));

    let mut intent = common::multi_merchant_intent();
    let first = coordinator.prepare(&intent).unwrap();
    intent.items[0].quantity += 1;
    let second = coordinator.prepare(&intent).unwrap();

    assert_ne!(first.fingerprint, second.fingerprint);
    assert_ne!(
        first.sub_orders[0].idempotency_key,
        second.sub_orders[0].idempotency_key
    );
}

#[tokio::test]
async fn test_attempt_survives_reload_from_file_store() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let intent = common::multi_merchant_intent();

    let (_submitter, coordinator) =
        submitter(&server, Arc::new(FileSessionStore::open(&path).unwrap()));
    let before = coordinator.prepare(&intent).unwrap();
    drop(coordinator);

    let (_submitter, coordinator) =
        submitter(&server, Arc::new(FileSessionStore::open(&path).unwrap()));
    let after = coordinator.prepare(&intent).unwrap();

    assert_eq!(before, after);
}

#[tokio::test]
async fn test_submission_refreshes_expired_credential() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/orders")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .with_status(200)
        .with_body(r#"{"token": "fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let orders = server
        .mock("POST", "/orders")
        .match_header("authorization", "Bearer fresh")
        .with_status(201)
        .with_body("{}")
        .expect(3)
        .create_async()
        .await;

    let gateway = common::gateway(&server);
    gateway.login("stale");
    let coordinator = Arc::new(CheckoutAttemptCoordinator::new(Arc::new(
        InMemorySessionStore::new(),
    )));
    let submitter = OrderSubmitter::new(gateway, coordinator);

    submitter
        .submit(&common::multi_merchant_intent())
        .await
        .unwrap();

    refresh.assert_async().await;
    orders.assert_async().await;
}
