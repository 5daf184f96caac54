use super::*;
use crate::error::ApiError;
use crate::state::test_helpers::FakeUpstream;
use crate::upstream::UploadPart;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::json;
use std::time::Duration;

/// Upstream whose booking endpoint hangs for a while, then answers 503.
struct SlowUnavailable {
    delay: Duration,
}

#[async_trait]
impl Upstream for SlowUnavailable {
    async fn get(&self, _: &str, _: &[(String, String)], _: Option<&str>) -> Result<serde_json::Value, ApiError> {
        Err(ApiError::from_status(503, None))
    }

    async fn get_uncached(
        &self,
        _: &str,
        _: &[(String, String)],
        _: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        Err(ApiError::from_status(503, None))
    }

    async fn send(
        &self,
        _: Method,
        _: &str,
        _: Option<&serde_json::Value>,
        _: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        tokio::time::sleep(self.delay).await;
        Err(ApiError::from_status(503, None))
    }

    async fn upload(&self, _: &str, _: Vec<UploadPart>, _: Option<&str>) -> Result<serde_json::Value, ApiError> {
        Err(ApiError::from_status(503, None))
    }
}

fn config(capacity: usize, max_attempts: u32) -> OutboxConfig {
    OutboxConfig { flush_interval: Duration::from_secs(30), max_attempts, capacity }
}

fn new_booking(driveway_id: &str) -> NewBooking {
    NewBooking {
        driveway_id: driveway_id.into(),
        start_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        total_amount: 20.0,
        special_requests: None,
    }
}

fn created(id: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "drivewayId": "dw1",
        "startDate": "2026-10-19",
        "startTime": "09:00",
        "endTime": "11:00",
        "totalAmount": 20.0,
        "status": "pending",
        "paymentStatus": "pending"
    })
}

#[test]
fn enqueue_respects_capacity() {
    let outbox = Outbox::new(&config(2, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();
    outbox.enqueue("tok", new_booking("b")).unwrap();
    assert_eq!(outbox.enqueue("tok", new_booking("c")).unwrap_err(), OutboxError::Full { capacity: 2 });
    assert_eq!(outbox.len(), 2);
}

#[test]
fn pending_for_filters_by_caller() {
    let outbox = Outbox::new(&config(10, 3));
    outbox.enqueue("alice", new_booking("a")).unwrap();
    outbox.enqueue("bob", new_booking("b")).unwrap();

    let alice = outbox.pending_for("alice");
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].booking.driveway_id, "a");
    assert!(outbox.pending_for("carol").is_empty());
}

#[tokio::test]
async fn flush_delivers_everything_when_upstream_is_back() {
    let fake = FakeUpstream::new();
    fake.respond("/bookings", created("b1"));
    let outbox = Outbox::new(&config(10, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();
    outbox.enqueue("tok", new_booking("b")).unwrap();

    let report = outbox.flush(&fake).await;
    assert_eq!(report, FlushReport { delivered: 2, dropped: 0, remaining: 0 });
    assert!(outbox.is_empty());

    let sends = fake.sends();
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].body.as_ref().unwrap()["drivewayId"], "a");
    assert_eq!(sends[1].body.as_ref().unwrap()["drivewayId"], "b");
    assert_eq!(sends[0].token.as_deref(), Some("tok"));
}

#[tokio::test]
async fn flush_stops_at_first_unreachable_and_keeps_order() {
    let fake = FakeUpstream::new();
    fake.fail("/bookings", ApiError::network("refused"));
    let outbox = Outbox::new(&config(10, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();
    outbox.enqueue("tok", new_booking("b")).unwrap();

    let report = outbox.flush(&fake).await;
    assert_eq!(report, FlushReport { delivered: 0, dropped: 0, remaining: 2 });
    assert_eq!(fake.sends().len(), 1, "second entry must not overtake the first");

    let pending = outbox.pending_for("tok");
    assert_eq!(pending[0].booking.driveway_id, "a");
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[1].attempts, 0);
}

#[tokio::test]
async fn flush_drops_rejected_and_exhausted_entries() {
    let fake = FakeUpstream::new();
    fake.fail("/bookings", ApiError::from_status(409, None));
    let outbox = Outbox::new(&config(10, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();
    let report = outbox.flush(&fake).await;
    assert_eq!(report, FlushReport { delivered: 0, dropped: 1, remaining: 0 });

    fake.fail("/bookings", ApiError::from_status(503, None));
    let outbox = Outbox::new(&config(10, 2));
    outbox.enqueue("tok", new_booking("a")).unwrap();
    assert_eq!(outbox.flush(&fake).await.remaining, 1);
    let report = outbox.flush(&fake).await;
    assert_eq!(report, FlushReport { delivered: 0, dropped: 1, remaining: 0 });
}

#[tokio::test]
async fn entries_stay_queued_while_delivery_is_in_flight() {
    let outbox = Outbox::new(&config(1, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();

    let flushing = {
        let outbox = outbox.clone();
        tokio::spawn(async move {
            let upstream = SlowUnavailable { delay: Duration::from_millis(200) };
            outbox.flush(&upstream).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(outbox.pending_for("tok").len(), 1, "in-flight entry must stay visible");
    assert_eq!(outbox.enqueue("tok", new_booking("b")).unwrap_err(), OutboxError::Full { capacity: 1 });

    let report = flushing.await.unwrap();
    assert_eq!(report, FlushReport { delivered: 0, dropped: 0, remaining: 1 });
    assert_eq!(outbox.pending_for("tok")[0].attempts, 1);
}

#[tokio::test]
async fn entries_enqueued_during_a_flush_wait_their_turn() {
    let outbox = Outbox::new(&config(10, 3));
    outbox.enqueue("tok", new_booking("a")).unwrap();

    let flushing = {
        let outbox = outbox.clone();
        tokio::spawn(async move {
            let upstream = SlowUnavailable { delay: Duration::from_millis(100) };
            outbox.flush(&upstream).await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    outbox.enqueue("tok", new_booking("b")).unwrap();
    flushing.await.unwrap();

    let pending = outbox.pending_for("tok");
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].booking.driveway_id, "a");
    assert_eq!(pending[1].booking.driveway_id, "b");
}
