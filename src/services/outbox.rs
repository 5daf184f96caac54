//! Offline booking outbox for submissions made while the backend is down.
//!
//! DESIGN
//! ======
//! When booking creation fails because the upstream is unreachable, the
//! request is parked here with the caller's token and the client gets a
//! `202`. A background task flushes the queue in FIFO order. The first
//! delivery that fails for the same reason stops the pass, so later entries
//! never overtake earlier ones. An entry leaves the queue only once its
//! delivery has an outcome; one flush pass runs at a time.
//!
//! ERROR HANDLING
//! ==============
//! A 4xx on replay means the booking itself is unacceptable (slot taken,
//! token expired); the entry is dropped, not retried. Entries that keep
//! failing are dropped after `max_attempts` passes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OutboxConfig;
use crate::error::ErrorCode;
use crate::models::NewBooking;
use crate::upstream::{Upstream, api};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OutboxError {
    #[error("offline queue is full ({capacity} pending bookings)")]
    Full { capacity: usize },
}

#[derive(Debug, Clone)]
struct Entry {
    id: Uuid,
    token: String,
    booking: NewBooking,
    attempts: u32,
    enqueued_at: DateTime<Utc>,
}

/// Caller-visible view of a queued booking. Never exposes the token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBooking {
    pub id: Uuid,
    pub booking: NewBooking,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub dropped: usize,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct Outbox {
    queue: Arc<Mutex<VecDeque<Entry>>>,
    flushing: Arc<tokio::sync::Mutex<()>>,
    capacity: usize,
    max_attempts: u32,
}

impl Outbox {
    #[must_use]
    pub fn new(config: &OutboxConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            flushing: Arc::new(tokio::sync::Mutex::new(())),
            capacity: config.capacity,
            max_attempts: config.max_attempts.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Entry>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// # Errors
    ///
    /// Returns `Full` when the queue is at capacity.
    pub fn enqueue(&self, token: &str, booking: NewBooking) -> Result<Uuid, OutboxError> {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return Err(OutboxError::Full { capacity: self.capacity });
        }
        let id = Uuid::new_v4();
        queue.push_back(Entry { id, token: token.to_owned(), booking, attempts: 0, enqueued_at: Utc::now() });
        info!(%id, pending = queue.len(), "booking parked in offline queue");
        Ok(id)
    }

    /// Bookings the given caller still has waiting.
    #[must_use]
    pub fn pending_for(&self, token: &str) -> Vec<QueuedBooking> {
        self.lock()
            .iter()
            .filter(|e| e.token == token)
            .map(|e| QueuedBooking {
                id: e.id,
                booking: e.booking.clone(),
                attempts: e.attempts,
                enqueued_at: e.enqueued_at,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Replay queued bookings in order until one hits an unreachable upstream.
    ///
    /// Entries stay queued while their delivery is in flight, so they keep
    /// counting against capacity and stay visible to `pending_for`. The
    /// lock is never held across an upstream call.
    pub async fn flush(&self, upstream: &dyn Upstream) -> FlushReport {
        let _pass = self.flushing.lock().await;
        let mut report = FlushReport::default();

        loop {
            let Some(entry) = self.lock().front().cloned() else {
                break;
            };
            let outcome = api::create_booking(upstream, &entry.booking, &entry.token).await;

            let mut queue = self.lock();
            let Some(index) = queue.iter().position(|e| e.id == entry.id) else {
                break;
            };
            match outcome {
                Ok(booking) => {
                    queue.remove(index);
                    info!(id = %entry.id, booking_id = %booking.id, "queued booking delivered");
                    report.delivered += 1;
                }
                Err(err) if err.is_unreachable() => {
                    let attempts = entry.attempts + 1;
                    if attempts >= self.max_attempts {
                        queue.remove(index);
                        warn!(id = %entry.id, attempts, error = %err, "queued booking dropped after retries");
                        report.dropped += 1;
                    } else if let Some(queued) = queue.get_mut(index) {
                        queued.attempts = attempts;
                    }
                    break;
                }
                Err(err) => {
                    queue.remove(index);
                    warn!(id = %entry.id, code = err.error_code(), error = %err, "queued booking rejected upstream, dropping");
                    report.dropped += 1;
                }
            }
        }

        report.remaining = self.len();
        report
    }
}

/// Spawn the periodic outbox flush. Returns a handle for shutdown.
pub fn spawn_flush_task(outbox: Outbox, upstream: Arc<dyn Upstream>, config: OutboxConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.flush_interval);
        loop {
            interval.tick().await;
            if outbox.is_empty() {
                continue;
            }
            debug!(pending = outbox.len(), "flushing outbox");
            let report = outbox.flush(upstream.as_ref()).await;
            info!(delivered = report.delivered, dropped = report.dropped, remaining = report.remaining, "outbox flush");
        }
    })
}

#[cfg(test)]
#[path = "outbox_test.rs"]
mod tests;
