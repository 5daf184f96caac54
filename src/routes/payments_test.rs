use super::*;
use std::sync::Arc;

use serde_json::json;

use crate::models::PaymentStatus;
use crate::state::test_helpers::{FakeUpstream, test_app_state};

fn booking(payment_status: &str) -> serde_json::Value {
    json!({
        "_id": "bk1",
        "driveway": "dw1",
        "startDate": "2030-01-07",
        "startTime": "10:00",
        "endTime": "12:00",
        "totalAmount": 15.0,
        "status": "confirmed",
        "paymentStatus": payment_status
    })
}

#[tokio::test]
async fn intent_requires_booking_id() {
    let fake = Arc::new(FakeUpstream::new());
    let state = test_app_state(fake.clone());

    let err = create_intent(State(state), AuthToken("tok".into()), ApiJson(json!({ "amount": 15.0 })))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
    assert!(fake.sends().is_empty());
}

#[tokio::test]
async fn intent_is_forwarded() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/payments/create-intent", json!({ "clientSecret": "cs_1" }));
    let state = test_app_state(fake.clone());

    let Json(intent) = create_intent(State(state), AuthToken("tok".into()), ApiJson(json!({ "bookingId": "bk1" })))
        .await
        .unwrap();
    assert_eq!(intent["clientSecret"], "cs_1");
    assert_eq!(fake.sends()[0].path, "/payments/create-intent");
}

#[tokio::test]
async fn confirm_returns_settled_booking() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/payments/confirm-payment", json!({ "success": true }));
    fake.respond("/bookings/bk1", json!({ "booking": booking("paid") }));
    let state = test_app_state(fake.clone());

    let body = ConfirmBody { payment_intent_id: "pi_1".into(), booking_id: "bk1".into() };
    let Json(settlement) = confirm(State(state), AuthToken("tok".into()), ApiJson(body)).await.unwrap();
    let Settlement::Settled { booking } = settlement else {
        panic!("expected a settled payment");
    };
    assert_eq!(booking.payment_status, PaymentStatus::Paid);

    let sent = fake.sends()[0].body.clone().unwrap();
    assert_eq!(sent["paymentIntentId"], "pi_1");
    assert_eq!(sent["bookingId"], "bk1");
}

#[tokio::test]
async fn failed_confirmation_skips_polling() {
    let fake = Arc::new(FakeUpstream::new());
    fake.fail("/payments/confirm-payment", ApiError::from_status(402, Some("Card declined".into())));
    let state = test_app_state(fake.clone());

    let body = ConfirmBody { payment_intent_id: "pi_1".into(), booking_id: "bk1".into() };
    let err = confirm(State(state), AuthToken("tok".into()), ApiJson(body)).await.unwrap_err();
    assert_eq!(err.status, 402);
    assert_eq!(err.message, "Card declined");
    assert_eq!(fake.get_count("/bookings/bk1"), 0);
}

#[tokio::test]
async fn status_is_passed_through() {
    let fake = Arc::new(FakeUpstream::new());
    fake.respond("/payments/status/bk1", json!({ "status": "paid" }));
    let state = test_app_state(fake);

    let Json(status) = status(State(state), AuthToken("tok".into()), ApiPath("bk1".into())).await.unwrap();
    assert_eq!(status["status"], "paid");
}
