//! HTTP surface driven through the router with `oneshot`.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{
    get_request, json_request, json_request_as_user, north_of, parse_response_body, TestHarness,
    CUSTOMER,
};
use domain::models::{EmergencyCategory, UrgencyLevel};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

fn create_body() -> serde_json::Value {
    json!({
        "category": "plumbing",
        "urgency": "critical",
        "title": "Burst pipe under the sink",
        "description": "Water everywhere",
        "location": {
            "address": "12 Adeola Odeku Street",
            "city": "Lagos",
            "state": "Lagos",
            "latitude": CUSTOMER.latitude,
            "longitude": CUSTOMER.longitude
        }
    })
}

#[tokio::test]
async fn test_health_endpoints() {
    let h = TestHarness::new();
    let app = h.router();

    let response = app.clone().oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["connected"], true);

    let response = app.oneshot(get_request("/api/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_and_read_emergency() {
    let h = TestHarness::new();
    let app = h.router();
    let user = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request_as_user("/api/v1/emergencies", user, create_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = parse_response_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["responseDeadline"].is_string());

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/v1/emergencies/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = parse_response_body(response).await;
    assert_eq!(status["id"], id);
    assert_eq!(status["category"], "plumbing");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/v1/emergencies/{id}/sla")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sla = parse_response_body(response).await;
    assert_eq!(sla["responseSlaMinutes"], 30);

    let response = app
        .oneshot(get_request(&format!("/api/v1/emergencies/{id}/tracking")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_requires_user_header() {
    let h = TestHarness::new();
    let response = h
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/emergencies", create_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let h = TestHarness::new();
    let mut body = create_body();
    body["title"] = json!("   ");
    body["location"]["latitude"] = json!(123.0);

    let response = h
        .router()
        .oneshot(json_request_as_user("/api/v1/emergencies", Uuid::new_v4(), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = parse_response_body(response).await;
    assert_eq!(error["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_emergency_is_404() {
    let h = TestHarness::new();
    let response = h
        .router()
        .oneshot(get_request(&format!("/api/v1/emergencies/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = parse_response_body(response).await;
    assert_eq!(error["error"], "not_found");
}

#[tokio::test]
async fn test_accept_complete_and_cancel_over_http() {
    let h = TestHarness::new();
    let app = h.router();
    let tech = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 1.0), 4.5)
        .await;
    let request = h.insert_request(UrgencyLevel::Critical, Utc::now()).await;
    let base = format!("/api/v1/emergencies/{}", request.id);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/accept"),
            json!({ "technicianId": tech.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = parse_response_body(response).await;
    assert_eq!(status["status"], "accepted");
    assert_eq!(status["assignedTechnicianId"], tech.id.to_string());

    let other = h
        .seed_technician(EmergencyCategory::Plumbing, north_of(CUSTOMER, 2.0), 4.5)
        .await;
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/accept"),
            json!({ "technicianId": other.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(parse_response_body(response).await["error"], "already_assigned");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/technicians/{}/location", tech.id),
            json!({ "latitude": CUSTOMER.latitude, "longitude": CUSTOMER.longitude }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/complete"),
            json!({ "technicianId": tech.id, "workNotes": "Valve replaced", "finalCost": -5.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/complete"),
            json!({ "technicianId": tech.id, "workNotes": "Valve replaced", "finalCost": 35000.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["status"], "completed");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/final-price"),
            json!({ "laborHours": 1.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(parse_response_body(response).await["total"].as_f64().unwrap() > 0.0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/cancel"),
            json!({ "reason": "too late" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        parse_response_body(response).await["error"],
        "invalid_transition"
    );
}

#[tokio::test]
async fn test_decline_without_offer_is_404() {
    let h = TestHarness::new();
    let request = h.insert_request(UrgencyLevel::SameDay, Utc::now()).await;
    let response = h
        .router()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/emergencies/{}/decline", request.id),
            json!({ "technicianId": Uuid::new_v4() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_location_ping_validation() {
    let h = TestHarness::new();
    let response = h
        .router()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/technicians/{}/location", Uuid::new_v4()),
            json!({ "latitude": 6.4, "longitude": 190.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
