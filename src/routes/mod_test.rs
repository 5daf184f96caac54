use super::*;
use std::sync::Arc;

use serde_json::json;

use crate::error::ApiError;
use crate::state::test_helpers::{FakeUpstream, test_app_state};

async fn serve(fake: Arc<FakeUpstream>) -> String {
    let app = app(test_app_state(fake));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn healthz_is_ok() {
    let base = serve(Arc::new(FakeUpstream::new())).await;
    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn protected_route_without_token_redirects_to_login() {
    let base = serve(Arc::new(FakeUpstream::new())).await;
    let resp = reqwest::get(format!("{base}/api/slots")).await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["redirect"], "/login");
    assert_eq!(body["code"], "E_UNAUTHORIZED");
}

#[tokio::test]
async fn markers_route_is_not_shadowed_by_id() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/driveways", json!([{ "_id": "a", "pricePerHour": 2.0, "location": { "lat": 1.0, "lng": 1.0 } }]));
    let base = serve(fake).await;

    let body: serde_json::Value = reqwest::get(format!("{base}/api/driveways/markers?zoom=14"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["zoom"], 14);
    assert_eq!(body["clustered"], false);
    assert_eq!(body["clusters"][0]["markerIds"][0], "a");
}

#[tokio::test]
async fn network_errors_surface_as_bad_gateway() {
    let fake = Arc::new(FakeUpstream::new());
    fake.fail("/driveways/x", ApiError::network("connection refused"));
    let base = serve(fake).await;

    let resp = reqwest::get(format!("{base}/api/driveways/x")).await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 0);
    assert_eq!(body["code"], "E_NETWORK");
}

#[tokio::test]
async fn bearer_token_reaches_upstream() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/bookings", json!([]));
    let base = serve(fake.clone()).await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/api/bookings"))
        .bearer_auth("tok-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let (_, token) = fake.last_get("/bookings").unwrap();
    assert_eq!(token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn cache_stats_are_exposed() {
    let base = serve(Arc::new(FakeUpstream::new())).await;
    let body: serde_json::Value = reqwest::get(format!("{base}/api/cache/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "entries": 0, "hits": 0, "misses": 0 }));
}

#[tokio::test]
async fn malformed_body_is_rejected_with_error_shape() {
    let base = serve(Arc::new(FakeUpstream::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/bookings/validate"))
        .bearer_auth("tok")
        .json(&json!({ "drivewayId": "dw1", "date": "2030-01-07", "startTime": "25:00", "endTime": "26:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 422);
    assert_eq!(body["code"], "E_VALIDATION");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unparseable_json_is_a_bad_request() {
    let base = serve(Arc::new(FakeUpstream::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/slots/quote"))
        .bearer_auth("tok")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "E_BAD_REQUEST");
}

#[tokio::test]
async fn bad_query_string_is_rejected_with_error_shape() {
    let base = serve(Arc::new(FakeUpstream::new())).await;

    let resp = reqwest::get(format!("{base}/api/geocoding/reverse?lat=north&lng=0"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "E_BAD_REQUEST");
}

#[tokio::test]
async fn fractional_zoom_is_floored() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/driveways", json!([{ "_id": "a", "pricePerHour": 2.0, "location": { "lat": 1.0, "lng": 1.0 } }]));
    let base = serve(fake).await;

    let resp = reqwest::get(format!("{base}/api/driveways/markers?zoom=12.5")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["zoom"], 12);
}
