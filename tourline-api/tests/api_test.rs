use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use tourline_api::{app, build_workflow, state::{AppState, AuthConfig}};
use tourline_booking::MemoryStore;
use tourline_catalog::{PricingConfig, RiskConfig};
use tourline_core::{ManualClock, MockPaymentAdapter};
use tourline_booking::BookingRules;
use tourline_store::app_config::{self, Config, ServerConfig, StorageBackend, StorageConfig};

fn test_app() -> Router {
    let config = Config {
        server: ServerConfig { port: 0 },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            url: None,
        },
        auth: app_config::AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_seconds: 3600,
        },
        pricing: PricingConfig::default(),
        risk: RiskConfig::default(),
        booking_rules: BookingRules::default(),
    };

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()));
    let workflow = build_workflow(
        Arc::new(MemoryStore::new()),
        Arc::new(MockPaymentAdapter),
        clock,
        &config,
    );

    app(AppState {
        workflow: Arc::new(workflow),
        db: None,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    })
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn token(app: &Router, role: &str, subject: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/token",
        None,
        Some(json!({ "role": role, "subject": subject, "email": format!("{}@example.com", subject) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

/// Registers a tour and one departure a month out; returns the instance id
async fn scheduled_instance(app: &Router, provider: &str, capacity: i32) -> String {
    let (status, tour) = send(
        app,
        "POST",
        "/v1/tours",
        Some(provider),
        Some(json!({
            "title": "Old Town Walk",
            "base_price": 2500,
            "currency": "EUR",
            "group_size": { "min": 2, "max": 10 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, instance) = send(
        app,
        "POST",
        &format!("/v1/tours/{}/instances", tour["id"].as_str().unwrap()),
        Some(provider),
        Some(json!({
            "date": "2026-07-01",
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "capacity": capacity,
            "min_participants": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(instance["status"], "scheduled");
    instance["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_booking_payment_and_cancellation_flow() {
    let app = test_app();
    let provider = token(&app, "provider", "provider-1").await;
    let customer = token(&app, "customer", "alice").await;
    let instance_id = scheduled_instance(&app, &provider, 4).await;

    let (status, receipt) = send(
        &app,
        "POST",
        &format!("/v1/instances/{}/bookings", instance_id),
        Some(&customer),
        Some(json!({ "number_of_people": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["booking"]["status"], "pending_payment");
    assert_eq!(receipt["booking"]["total_amount"], 5000);
    let booking_id = receipt["booking"]["id"].as_str().unwrap().to_string();
    let intent_id = receipt["payment"]["id"].as_str().unwrap().to_string();

    let (status, instance) = send(&app, "GET", &format!("/v1/instances/{}", instance_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instance["available_spots"], 2);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/webhooks/payments",
        None,
        Some(json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": intent_id, "status": "succeeded" } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, booking) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "confirmed");

    let (status, list) = send(&app, "GET", "/v1/bookings", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, cancelled) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/cancel", booking_id),
        Some(&customer),
        Some(json!({ "reason": "change of plans" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation"]["refund_percentage"], 100);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/cancel", booking_id),
        Some(&customer),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, instance) = send(&app, "GET", &format!("/v1/instances/{}", instance_id), None, None).await;
    assert_eq!(instance["available_spots"], 4);
}

#[tokio::test]
async fn test_overbooking_is_conflict() {
    let app = test_app();
    let provider = token(&app, "provider", "provider-1").await;
    let customer = token(&app, "customer", "bob").await;
    let instance_id = scheduled_instance(&app, &provider, 4).await;
    let uri = format!("/v1/instances/{}/bookings", instance_id);

    let (status, _) = send(&app, "POST", &uri, Some(&customer), Some(json!({ "number_of_people": 3 }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", &uri, Some(&customer), Some(json!({ "number_of_people": 2 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient capacity"));

    let (status, _) = send(&app, "POST", &uri, Some(&customer), Some(json!({ "number_of_people": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_route_protection() {
    let app = test_app();
    let provider = token(&app, "provider", "provider-1").await;
    let other_provider = token(&app, "provider", "provider-2").await;
    let alice = token(&app, "customer", "alice").await;
    let mallory = token(&app, "customer", "mallory").await;
    let instance_id = scheduled_instance(&app, &provider, 4).await;

    let uri = format!("/v1/instances/{}/bookings", instance_id);
    let (status, _) = send(&app, "POST", &uri, None, Some(json!({ "number_of_people": 1 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Customer tokens carry no provider claims
    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/instances/{}/cancel", instance_id),
        Some(&alice),
        Some(json!({ "reason": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/instances/{}/cancel", instance_id),
        Some(&other_provider),
        Some(json!({ "reason": "not mine" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, receipt) = send(&app, "POST", &uri, Some(&alice), Some(json!({ "number_of_people": 1 }))).await;
    let booking_id = receipt["booking"]["id"].as_str().unwrap();
    let (status, _) = send(&app, "GET", &format!("/v1/bookings/{}", booking_id), Some(&mallory), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_cancels_instance() {
    let app = test_app();
    let provider = token(&app, "provider", "provider-1").await;
    let customer = token(&app, "customer", "carol").await;
    let instance_id = scheduled_instance(&app, &provider, 6).await;

    send(
        &app,
        "POST",
        &format!("/v1/instances/{}/bookings", instance_id),
        Some(&customer),
        Some(json!({ "number_of_people": 2 })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/instances/{}/cancel", instance_id),
        Some(&provider),
        Some(json!({ "reason": "storm warning" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instance"]["status"], "cancelled");
    assert_eq!(body["cancelled_bookings"].as_array().unwrap().len(), 1);
    assert_eq!(body["cancelled_bookings"][0]["cancellation"]["cancelled_by"], "system");
}

#[tokio::test]
async fn test_provider_lists_own_tours() {
    let app = test_app();
    let provider = token(&app, "provider", "provider-1").await;
    let other_provider = token(&app, "provider", "provider-2").await;
    scheduled_instance(&app, &provider, 4).await;

    let (status, tours) = send(&app, "GET", "/v1/tours", Some(&provider), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tours.as_array().unwrap().len(), 1);
    assert_eq!(tours[0]["provider_id"], "provider-1");

    let (status, tours) = send(&app, "GET", "/v1/tours", Some(&other_provider), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tours.as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/v1/tours", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
