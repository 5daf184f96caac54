use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use serde_json::json;

use crate::config::UpstreamConfig;
use crate::state::test_helpers::FakeUpstream;
use crate::upstream::ApiClient;
use crate::upstream::cache::ResponseCache;

fn booking_json(payment_status: &str) -> serde_json::Value {
    json!({
        "id": "b1",
        "drivewayId": "dw1",
        "startDate": "2026-10-19",
        "startTime": "09:00",
        "endTime": "11:00",
        "totalAmount": 20.0,
        "status": "pending",
        "paymentStatus": payment_status
    })
}

fn fast_poll(max_attempts: u32) -> PaymentPollConfig {
    PaymentPollConfig { interval: Duration::from_millis(1), max_attempts }
}

#[tokio::test]
async fn settles_once_status_leaves_pending() {
    let fake = FakeUpstream::new();
    fake.push_response("/bookings/b1", Ok(booking_json("pending")));
    fake.push_response("/bookings/b1", Ok(booking_json("pending")));
    fake.push_response("/bookings/b1", Ok(booking_json("paid")));

    let outcome = await_settlement(&fake, "b1", "tok", &fast_poll(10)).await.unwrap();
    let Settlement::Settled { booking } = outcome else {
        panic!("expected settled, got {outcome:?}");
    };
    assert_eq!(booking.payment_status, PaymentStatus::Paid);
    assert_eq!(fake.get_count("/bookings/b1"), 3);
    assert_eq!(fake.uncached_count("/bookings/b1"), 3);
    let (params, _) = fake.last_get("/bookings/b1").unwrap();
    assert!(params.is_empty(), "polling must not invent query params: {params:?}");
}

async fn settling_backend(pending_polls: usize) -> (String, Arc<AtomicUsize>) {
    let polls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/api/bookings/b1",
            get(move |State(polls): State<Arc<AtomicUsize>>| async move {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                let status = if n < pending_polls { "pending" } else { "paid" };
                Json(booking_json(status))
            }),
        )
        .with_state(polls.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), polls)
}

#[tokio::test]
async fn polling_leaves_the_response_cache_untouched() {
    let (base, polls) = settling_backend(3).await;
    let config = UpstreamConfig {
        base_url: base,
        max_retries: 0,
        retry_base: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
    };
    let client = ApiClient::new(&config, ResponseCache::new(Duration::from_secs(300))).unwrap();
    let before = client.cache_stats();

    let outcome = await_settlement(&client, "b1", "tok", &fast_poll(10)).await.unwrap();

    assert!(matches!(outcome, Settlement::Settled { .. }));
    assert_eq!(polls.load(Ordering::SeqCst), 4);
    assert_eq!(client.cache_stats().entries, before.entries);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let fake = FakeUpstream::new();
    fake.respond("/bookings/b1", booking_json("pending"));

    let outcome = await_settlement(&fake, "b1", "tok", &fast_poll(4)).await.unwrap();
    assert!(matches!(outcome, Settlement::StillPending { attempts: 4, .. }));
    assert_eq!(fake.get_count("/bookings/b1"), 4);
}

#[tokio::test]
async fn transient_errors_keep_polling() {
    let fake = FakeUpstream::new();
    fake.push_response("/bookings/b1", Err(ApiError::from_status(503, None)));
    fake.push_response("/bookings/b1", Ok(booking_json("failed")));

    let outcome = await_settlement(&fake, "b1", "tok", &fast_poll(5)).await.unwrap();
    assert!(matches!(outcome, Settlement::Settled { booking } if booking.payment_status == PaymentStatus::Failed));
}

#[tokio::test]
async fn client_error_stops_immediately() {
    let fake = FakeUpstream::new();
    fake.fail("/bookings/b1", ApiError::from_status(404, None));

    let err = await_settlement(&fake, "b1", "tok", &fast_poll(5)).await.unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(fake.get_count("/bookings/b1"), 1);
}

#[tokio::test]
async fn persistent_network_failure_returns_last_error() {
    let fake = FakeUpstream::new();
    fake.fail("/bookings/b1", ApiError::network("refused"));

    let err = await_settlement(&fake, "b1", "tok", &fast_poll(3)).await.unwrap_err();
    assert_eq!(err.status, 0);
    assert_eq!(fake.get_count("/bookings/b1"), 3);
}
