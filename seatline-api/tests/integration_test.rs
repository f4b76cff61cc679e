use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use seatline_api::{app, AppState};
use seatline_core::memory::{MemoryHoldStore, MemorySeatLedger};
use seatline_core::{HoldPolicy, HoldStore, ReservationCoordinator, SeatLedger};
use seatline_store::app_config::SessionConfig;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    ledger: MemorySeatLedger,
    holds: MemoryHoldStore,
}

fn test_app() -> TestApp {
    let ledger = MemorySeatLedger::new();
    let holds = MemoryHoldStore::new();
    let coordinator = ReservationCoordinator::new(
        Arc::new(ledger.clone()),
        Arc::new(holds.clone()),
        HoldPolicy::default(),
    );
    let (events, _) = broadcast::channel(16);

    let state = AppState {
        seats: Arc::new(coordinator),
        events,
        session: SessionConfig::default(),
        hold_ttl_seconds: 60,
        allowed_origins: vec![],
    };

    TestApp { router: app(state), ledger, holds }
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("seatline_token={}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_needs_no_cookie() {
    let t = test_app();
    let response = t
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_first_visit_mints_session_cookie() {
    let t = test_app();

    let response = t
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/v1/seats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("seatline_token="));
    assert!(cookie.contains("HttpOnly"));

    let response = t
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/seats")
                .header(header::COOKIE, "seatline_token=tok-A")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_seat_seven_scenario() {
    let t = test_app();
    for n in 1..=7 {
        let (status, seat) = call(&t.router, "POST", "/api/v1/seats", Some("admin"), Some(json!({"number": n}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(seat["is_available"], true);
    }

    let (status, body) = call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": 7}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "HELD");
    assert!(t.holds.ttl(7, "tok-A").await.is_some());

    let (status, body) = call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-B"), Some(json!({"id": 7}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat is already reserved by other user");

    let (status, body) = call(&t.router, "GET", "/api/v1/seats/7/state", Some("tok-A"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"state": "HELD", "own": true}));

    let (status, _) = call(
        &t.router,
        "POST",
        "/api/v1/seats/buy",
        Some("tok-A"),
        Some(json!({"id": 7, "fname": "Ann", "lname": "Lee", "email": "a@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, seat) = call(&t.router, "GET", "/api/v1/seats/7", Some("tok-B"), None).await;
    assert_eq!(seat["is_available"], false);

    let (_, purchases) = call(&t.router, "GET", "/api/v1/seats/purchases", Some("tok-B"), None).await;
    assert_eq!(purchases[0]["seat_id"], 7);
    assert_eq!(purchases[0]["fname"], "Ann");
    assert_eq!(purchases[0]["lname"], "Lee");
    assert_eq!(purchases[0]["email"], "a@x.com");

    let (status, body) = call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-B"), Some(json!({"id": 7}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat is not available");
}

#[tokio::test]
async fn test_unreserve_is_scoped_to_holder() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();

    call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;

    let (status, body) = call(&t.router, "DELETE", "/api/v1/seats/unreserve", Some("tok-B"), Some(json!({"id": seat.id}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat is not reserved by you");

    let (status, _) = call(&t.router, "DELETE", "/api/v1/seats/unreserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(t.holds.ttl(seat.id, "tok-A").await.is_none());
}

#[tokio::test]
async fn test_buy_without_hold_conflicts() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();

    let (status, body) = call(
        &t.router,
        "POST",
        "/api/v1/seats/buy",
        Some("tok-A"),
        Some(json!({"id": seat.id, "fname": "Ann", "lname": "Lee"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "can not buy that seat because it is not reserved");
}

#[tokio::test]
async fn test_sold_seat_cannot_be_bought_again() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();
    let buy = json!({"id": seat.id, "fname": "Ann", "lname": "Lee"});
    call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    let (status, _) = call(&t.router, "POST", "/api/v1/seats/buy", Some("tok-A"), Some(buy.clone())).await;
    assert_eq!(status, StatusCode::OK);

    t.holds
        .set_hold(seat.id, "tok-A", std::time::Duration::from_secs(60))
        .await
        .unwrap();
    let (status, body) = call(&t.router, "POST", "/api/v1/seats/buy", Some("tok-A"), Some(buy)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat is not available");

    let (_, purchases) = call(&t.router, "GET", "/api/v1/seats/purchases", Some("tok-A"), None).await;
    assert_eq!(purchases.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_purchase_payload_is_bad_request() {
    let t = test_app();
    let (status, _) = call(
        &t.router,
        "POST",
        "/api/v1/seats/buy",
        Some("tok-A"),
        Some(json!({"id": 1, "fname": "  ", "lname": "Lee"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_seat_is_not_found() {
    let t = test_app();
    let (status, _) = call(&t.router, "GET", "/api/v1/seats/99", Some("tok-A"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hold_store_outage_is_service_unavailable() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();
    t.holds.set_unreachable(true);

    let (status, _) = call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_partial_failure_surfaces_and_shows_in_audit() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();
    call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    t.ledger.fail_availability_updates(true);

    let (status, body) = call(
        &t.router,
        "POST",
        "/api/v1/seats/buy",
        Some("tok-A"),
        Some(json!({"id": seat.id, "fname": "Ann", "lname": "Lee"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("was recorded"));

    let (_, audit) = call(&t.router, "GET", "/api/v1/seats/audit", Some("tok-A"), None).await;
    assert_eq!(audit["inconsistent_seats"], json!([seat.id]));
}

#[tokio::test]
async fn test_cancel_purchase_once() {
    let t = test_app();
    let seat = t.ledger.create_seat(1).await.unwrap();
    call(&t.router, "POST", "/api/v1/seats/reserve", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    call(
        &t.router,
        "POST",
        "/api/v1/seats/buy",
        Some("tok-A"),
        Some(json!({"id": seat.id, "fname": "Ann", "lname": "Lee"})),
    )
    .await;

    let (status, body) = call(&t.router, "DELETE", "/api/v1/seats/cancel", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, _) = call(&t.router, "DELETE", "/api/v1/seats/cancel", Some("tok-A"), Some(json!({"id": seat.id}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Cancelling does not reopen the seat.
    let (_, seat) = call(&t.router, "GET", &format!("/api/v1/seats/{}", seat.id), Some("tok-A"), None).await;
    assert_eq!(seat["is_available"], false);
}
