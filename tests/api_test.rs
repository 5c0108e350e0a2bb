mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use common::Fixture;
use stockroom::server;

fn app(fx: &Fixture) -> Router {
    server::build_router(fx.state.clone(), &[])
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().uri(uri).method(method);
    let req = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let fx = Fixture::new().await;
    let (status, body) = send(&app(&fx), "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_borrow_flow_over_http() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 1, fx.store_a).await;
    let app = app(&fx);

    let (status, created) = send(
        &app,
        "POST",
        "/api/transactions",
        Some(json!({
            "requester_id": fx.employee,
            "item_id": laptop.id,
            "transaction_type": "Borrow",
            "quantity": 1,
            "origin_store_id": fx.store_a,
            "due_date": "2099-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "Pending");
    let id = created["id"].as_i64().unwrap();

    let (status, approved) = send(
        &app,
        "PUT",
        &format!("/api/transactions/{id}/approve"),
        Some(json!({ "approver_id": fx.keeper })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "Approved");

    // Wrong store
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/transactions/{id}/return"),
        Some(json!({
            "actor_id": fx.employee,
            "return_store_id": fx.store_b,
            "condition": "Good"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "STORE_MISMATCH");

    let (status, returned) = send(
        &app,
        "PUT",
        &format!("/api/transactions/{id}/return"),
        Some(json!({
            "actor_id": fx.employee,
            "return_store_id": fx.store_a,
            "condition": "Good"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "Completed");

    let (status, view) = send(&app, "GET", &format!("/api/transactions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "Completed");
    assert!(view["overdue_days"].is_null());
}

#[tokio::test]
async fn test_validation_error_shape() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 3, fx.store_a).await;

    let (status, body) = send(
        &app(&fx),
        "POST",
        "/api/transactions",
        Some(json!({
            "requester_id": fx.employee,
            "item_id": laptop.id,
            "transaction_type": "Borrow",
            "quantity": 5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "quantity");
    assert!(body["error"]["message"].as_str().unwrap().contains("insufficient"));
}

#[tokio::test]
async fn test_reject_without_reason_is_bad_request() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 1, fx.store_a).await;
    let created = fx
        .service()
        .create(fx.borrow_request(&laptop, 1))
        .await
        .unwrap();

    let (status, body) = send(
        &app(&fx),
        "PUT",
        &format!("/api/transactions/{}/reject", created.id),
        Some(json!({ "approver_id": fx.keeper })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "reason");
}

#[tokio::test]
async fn test_conflict_and_forbidden_and_not_found() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 2, fx.store_a).await;
    let borrow = fx.approved_borrow(&laptop, 1).await;
    let app = app(&fx);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/transactions/{}/approve", borrow.id),
        Some(json!({ "approver_id": fx.keeper })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/transactions/{}/cancel", borrow.id),
        Some(json!({ "actor_id": fx.other_employee, "reason": "mine now" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTHORIZATION_ERROR");

    let (status, body) = send(&app, "GET", "/api/transactions/4040", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_filters_by_query() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 2, fx.store_a).await;
    let drill = fx.add_item("drill", 2, fx.store_a).await;
    fx.approved_borrow(&laptop, 1).await;
    fx.service()
        .create(fx.borrow_request(&drill, 1))
        .await
        .unwrap();
    let app = app(&fx);

    let (status, all) = send(&app, "GET", "/api/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, pending) = send(&app, "GET", "/api/transactions?status=Pending&type=Borrow", None).await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["item_id"], drill.id);

    let (status, overdue) = send(&app, "GET", "/api/transactions/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(overdue.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delivery_endpoints() {
    let fx = Fixture::new().await;
    let chairs = fx.add_item("chairs", 6, fx.store_a).await;
    let app = app(&fx);

    let (status, transfer) = send(
        &app,
        "POST",
        "/api/transactions",
        Some(json!({
            "requester_id": fx.keeper,
            "item_id": chairs.id,
            "transaction_type": "Transfer",
            "quantity": 6,
            "origin_store_id": fx.store_a,
            "destination_store_id": fx.store_b
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tx_id = transfer["id"].as_i64().unwrap();

    send(
        &app,
        "PUT",
        &format!("/api/transactions/{tx_id}/approve"),
        Some(json!({ "approver_id": fx.admin })),
    )
    .await;

    let (status, delivery) = send(
        &app,
        "POST",
        &format!("/api/transactions/{tx_id}/delivery"),
        Some(json!({ "actor_id": fx.keeper, "assignee_id": fx.courier })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(delivery["status"], "Pending");
    let delivery_id = delivery["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/deliveries/{delivery_id}/deliver"),
        Some(json!({ "actor_id": fx.courier })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, picked) = send(
        &app,
        "PUT",
        &format!("/api/deliveries/{delivery_id}/pickup"),
        Some(json!({ "actor_id": fx.courier })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(picked["status"], "In-Progress");

    let (status, delivered) = send(
        &app,
        "PUT",
        &format!("/api/deliveries/{delivery_id}/deliver"),
        Some(json!({ "actor_id": fx.courier, "notes": "dock 2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "Completed");
    assert_eq!(fx.item(chairs.id).await.store_id, fx.store_b);
}

#[tokio::test]
async fn test_audit_endpoints() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 2, fx.store_a).await;
    fx.approved_borrow(&laptop, 1).await;
    let app = app(&fx);

    let (status, entries) = send(&app, "GET", "/api/audit-logs?action=APPROVE", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["actor_id"], fx.keeper);

    let (status, stats) = send(&app, "GET", "/api/audit-logs/stats?days=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(stats
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["action_type"] == "BORROW" && s["count"] == 1));

    let (status, issues) = send(&app, "GET", "/api/audit-logs/integrity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(issues.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/audit-logs?actor_id={}&older_than_days=30", fx.keeper),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, purged) = send(
        &app,
        "DELETE",
        &format!("/api/audit-logs?actor_id={}&older_than_days=30", fx.admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(purged["deleted"], 0);
}
