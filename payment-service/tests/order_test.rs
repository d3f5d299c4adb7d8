mod common;

use common::{TestApp, TEST_USER_ID};
use payment_service::models::PaymentStatus;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn create_order_persists_created_record() {
    let app = TestApp::spawn().await;

    // The gateway must see minor units and the correlation notes.
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({
            "amount": 50000,
            "currency": "INR",
            "notes": { "userId": TEST_USER_ID }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_A1",
            "entity": "order",
            "amount": 50000,
            "amount_paid": 0,
            "amount_due": 50000,
            "currency": "INR",
            "receipt": "receipt_test",
            "status": "created",
            "attempts": 0,
            "notes": { "userId": TEST_USER_ID },
            "created_at": 1700000000
        })))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let response = app
        .post_order(json!({ "amount": 500, "currency": "INR" }), Some(TEST_USER_ID))
        .await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["order"]["id"], "order_A1");
    assert_eq!(body["payment"]["status"], "CREATED");

    let records = app.payments_for_order("order_A1").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount, 500.0);
    assert_eq!(records[0].currency, "INR");
    assert_eq!(records[0].user_id, TEST_USER_ID);
    assert_eq!(records[0].status, PaymentStatus::Created);
    assert!(records[0].gateway_payment_id.is_none());
    assert!(records[0].event_id.is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn create_order_rejects_invalid_amount() {
    let app = TestApp::spawn().await;

    let response = app
        .post_order(json!({ "amount": 0 }), Some(TEST_USER_ID))
        .await;
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid amount");

    // Missing amount entirely.
    let response = app
        .post_order(json!({ "currency": "INR" }), Some(TEST_USER_ID))
        .await;
    assert_eq!(response.status(), 400);

    assert_eq!(app.payment_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn create_order_requires_authenticated_user() {
    let app = TestApp::spawn().await;

    let response = app.post_order(json!({ "amount": 500 }), None).await;
    assert_eq!(response.status(), 401);
    assert_eq!(app.payment_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn create_order_gateway_failure_persists_nothing() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Order amount less than minimum amount allowed",
                "source": "business",
                "step": "payment_initiation",
                "reason": "input_validation_failed"
            }
        })))
        .mount(&app.gateway)
        .await;

    let response = app
        .post_order(json!({ "amount": 500 }), Some(TEST_USER_ID))
        .await;
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Order amount less than minimum amount allowed");

    // No partial record without a remote order.
    assert_eq!(app.payment_count().await, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn get_order_is_scoped_to_its_owner() {
    let app = TestApp::spawn().await;

    app.seed_created_record("order_B1", TEST_USER_ID, 500.0).await;

    let response = app.get_order("order_B1", TEST_USER_ID).await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["gateway_order_id"], "order_B1");
    assert_eq!(body["status"], "CREATED");

    let response = app.get_order("order_B1", "someone-else").await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
