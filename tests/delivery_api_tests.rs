mod common;

use axum::http::StatusCode;
use logistics_backend::{
    jobs::notification_dispatch,
    models::actor::{Actor, Role},
    services::notifications::EmailTemplate,
};
use serde_json::json;

use crate::common::{
    logistics, other_seller, seller, send, FakeInventory, FakeNotifier, SentNotification,
    TestContext, CUSTOMER_ID, SELLER_ID,
};

async fn create_via_api(ctx: &TestContext, actor: &Actor, items: serde_json::Value) -> i32 {
    let (status, body) = send(
        ctx.router(),
        "POST",
        "/api/deliveries",
        Some(actor),
        Some(json!({
            "delivery_type": "home_delivery",
            "store_id": "S1",
            "customer_id": CUSTOMER_ID,
            "items": items,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap() as i32
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new().await;
    let (status, body) = send(ctx.router(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let ctx = TestContext::new().await;

    let (status, body) = send(ctx.router(), "GET", "/api/deliveries", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));

    let bogus = Actor::new(1, Role::Admin);
    let request = axum::http::Request::builder()
        .uri("/api/deliveries")
        .header("x-user-id", bogus.user_id.to_string())
        .header("x-user-role", "driver")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.router(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_then_fetch_detail() {
    let ctx = TestContext::new().await;
    let id = create_via_api(&ctx, &seller(), json!([
        {"product_sku": "SKU-A", "quantity": 2},
        {"product_sku": "SKU-B", "quantity": 1}
    ]))
    .await;

    let (status, body) = send(ctx.router(), "GET", &format!("/api/deliveries/{id}"), Some(&seller()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "pending");
    assert_eq!(body["created_by"], SELLER_ID);
    assert_eq!(body["customer_name"], "Ana Pérez");
    assert_eq!(body["items"][0]["product_sku"], "SKU-A");
    assert_eq!(body["items"][0]["pending_quantity"], 2);
    assert_eq!(body["items"][0]["product_name"], "Colchón Gani Plus 2 plazas");
    assert!(body["last_operation"].is_null());
}

#[tokio::test]
async fn test_create_validation_error_shape() {
    let ctx = TestContext::new().await;
    let (status, body) = send(
        ctx.router(),
        "POST",
        "/api/deliveries",
        Some(&seller()),
        Some(json!({"delivery_type": "home_delivery", "store_id": "S1", "items": []})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
    assert_eq!(body["error"], "customer_id is required for home deliveries");
}

#[tokio::test]
async fn test_fulfill_over_http_partial_then_full() {
    let mut ctx = TestContext::new().await;
    let id = create_via_api(&ctx, &seller(), json!([
        {"product_sku": "SKU-A", "quantity": 2},
        {"product_sku": "SKU-B", "quantity": 1}
    ]))
    .await;
    let uri = format!("/api/deliveries/{id}/fulfill");

    let (status, body) = send(
        ctx.router(),
        "POST",
        &uri,
        Some(&logistics()),
        Some(json!({
            "items": [{"product_sku": "SKU-A", "quantity": 2, "store_id": "S2"}],
            "carrier_id": 7,
            "delivery_cost": "1500.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["fully_delivered"], false);
    assert_eq!(body["delivery"]["state"], "pending");
    assert_eq!(body["operation"]["dispatch"]["mode"], "carrier");
    assert_eq!(body["transfers"][0]["origin_store"], "S2");
    assert_eq!(body["transfers"][0]["dest_store"], "S1");

    let (status, body) = send(
        ctx.router(),
        "POST",
        &uri,
        Some(&logistics()),
        Some(json!({
            "items": [{"product_sku": "SKU-B", "quantity": 1, "source_store": "S1"}],
            "pickup_store": "S1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["fully_delivered"], true);
    assert_eq!(body["delivery"]["state"], "delivered");
    assert_eq!(body["delivery"]["last_operation"]["dispatch"]["mode"], "pickup");
    assert_eq!(ctx.drain_events().len(), 1);

    let (status, body) = send(
        ctx.router(),
        "GET",
        &format!("/api/deliveries/{id}/operations"),
        Some(&logistics()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ops = body.as_array().unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0]["items"][0]["store_id"], "S2");
    assert_eq!(ops[1]["dispatch"]["store"], "S1");
}

#[tokio::test]
async fn test_fulfill_with_both_modes_is_bad_request() {
    let ctx = TestContext::new().await;
    let id = create_via_api(&ctx, &seller(), json!([{"product_sku": "SKU-A", "quantity": 1}])).await;

    let (status, body) = send(
        ctx.router(),
        "POST",
        &format!("/api/deliveries/{id}/fulfill"),
        Some(&logistics()),
        Some(json!({
            "items": [{"product_sku": "SKU-A", "quantity": 1, "store_id": "S1"}],
            "carrier_id": 7,
            "delivery_cost": "100.50",
            "pickup_store": "S1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");
}

#[tokio::test]
async fn test_transfer_failure_reports_completed_transfers() {
    let ctx = TestContext::with_inventory(FakeInventory::failing_on(2)).await;
    let id = create_via_api(&ctx, &seller(), json!([
        {"product_sku": "SKU-A", "quantity": 1},
        {"product_sku": "SKU-B", "quantity": 1}
    ]))
    .await;

    let (status, body) = send(
        ctx.router(),
        "POST",
        &format!("/api/deliveries/{id}/fulfill"),
        Some(&logistics()),
        Some(json!({
            "items": [
                {"product_sku": "SKU-A", "quantity": 1, "store_id": "S2"},
                {"product_sku": "SKU-B", "quantity": 1, "store_id": "S3"}
            ],
            "pickup_store": "S1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "DependencyError");
    assert!(body["error"].as_str().unwrap().contains("inventory transfer 2 of 2"));
    assert_eq!(body["details"]["completed_transfers"][0]["product_sku"], "SKU-A");
    assert_eq!(body["details"]["completed_transfers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_patch_errors_map_to_statuses() {
    let ctx = TestContext::new().await;
    let id = create_via_api(&ctx, &seller(), json!([{"product_sku": "SKU-A", "quantity": 1}])).await;
    let uri = format!("/api/deliveries/{id}");

    let (status, body) = send(ctx.router(), "PATCH", &uri, Some(&logistics()), Some(json!({"state": "delivered"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "InvalidStateTransition");

    let (status, body) = send(ctx.router(), "PATCH", "/api/deliveries/999", Some(&logistics()), Some(json!({"state": "cancelled"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFoundError");

    let (status, body) = send(
        ctx.router(),
        "PATCH",
        &uri,
        Some(&logistics()),
        Some(json!({"id": id, "scheduledDate": "2026-11-02"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled_date"], "2026-11-02");

    let (status, body) = send(ctx.router(), "PATCH", &uri, Some(&logistics()), Some(json!({"state": "cancelled"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cancelled");
    assert!(body["scheduled_date"].is_null());
}

#[tokio::test]
async fn test_listing_is_scoped_for_sales() {
    let ctx = TestContext::new().await;
    create_via_api(&ctx, &seller(), json!([{"product_sku": "SKU-A", "quantity": 1}])).await;
    create_via_api(&ctx, &other_seller(), json!([{"product_sku": "SKU-A", "quantity": 1}])).await;

    let (status, body) = send(ctx.router(), "GET", "/api/deliveries?state=pending", Some(&seller()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page_size"], 20);

    let (_, body) = send(ctx.router(), "GET", "/api/deliveries?page=1", Some(&logistics()), None).await;
    assert_eq!(body["total"], 2);

    let (status, body) = send(ctx.router(), "GET", "/api/deliveries?page=0", Some(&logistics()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ValidationError");

    let uri = format!("/api/deliveries?page={}", u64::MAX);
    let (status, body) = send(ctx.router(), "GET", &uri, Some(&logistics()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "page out of range");
}

#[tokio::test]
async fn test_fulfilled_event_drives_notifications() {
    let mut ctx = TestContext::new().await;
    let id = create_via_api(&ctx, &seller(), json!([{"product_sku": "SKU-A", "quantity": 1}])).await;

    let (status, _) = send(
        ctx.router(),
        "POST",
        &format!("/api/deliveries/{id}/fulfill"),
        Some(&logistics()),
        Some(json!({
            "items": [{"product_sku": "SKU-A", "quantity": 1, "store_id": "S1"}],
            "pickup_store": "S1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = ctx.drain_events();
    assert_eq!(events.len(), 1);

    let notifier = FakeNotifier::default();
    let sent = notification_dispatch::dispatch(&notifier, &events[0], "gani").await;
    assert_eq!(sent, 3);
    assert_eq!(
        notifier.sent(),
        vec![
            SentNotification::FollowUp {
                delivery_id: id,
                user_id: SELLER_ID
            },
            SentNotification::Email {
                template: EmailTemplate::GaniWarranty,
                to: "ana@example.com".to_string(),
                delivery_id: id
            },
            SentNotification::Email {
                template: EmailTemplate::ReviewRequest,
                to: "ana@example.com".to_string(),
                delivery_id: id
            },
        ]
    );

    // A failing channel does not stop the others
    let flaky = FakeNotifier {
        fail_follow_up: true,
        ..Default::default()
    };
    assert_eq!(notification_dispatch::dispatch(&flaky, &events[0], "gani").await, 2);
    assert_eq!(flaky.sent().len(), 2);
}
