//! Payment confirmation polling.
//!
//! After the upstream accepts a payment confirmation, the booking's
//! `paymentStatus` flips asynchronously once the processor's webhook lands.
//! `await_settlement` re-fetches the booking on a fixed interval until the
//! status leaves `pending` or attempts run out.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PaymentPollConfig;
use crate::error::{ApiError, ErrorCode};
use crate::models::{Booking, PaymentStatus};
use crate::upstream::{Upstream, api};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum Settlement {
    /// Payment reached a terminal status.
    Settled { booking: Booking },
    /// Still pending after every attempt; the client should keep checking.
    StillPending { booking: Booking, attempts: u32 },
}

/// Poll the booking until its payment settles.
///
/// Retryable fetch failures count as an attempt and polling continues;
/// other failures end the wait immediately.
///
/// # Errors
///
/// Returns the last upstream error if no fetch ever succeeded, or the first
/// non-retryable error.
pub async fn await_settlement(
    upstream: &dyn Upstream,
    booking_id: &str,
    token: &str,
    poll: &PaymentPollConfig,
) -> Result<Settlement, ApiError> {
    let mut last_seen: Option<Booking> = None;
    let mut last_error: Option<ApiError> = None;
    let attempts = poll.max_attempts.max(1);

    for attempt in 1..=attempts {
        match api::get_booking_fresh(upstream, booking_id, token).await {
            Ok(booking) if booking.payment_status != PaymentStatus::Pending => {
                info!(booking_id, attempt, status = ?booking.payment_status, "payment settled");
                return Ok(Settlement::Settled { booking });
            }
            Ok(booking) => {
                debug!(booking_id, attempt, "payment still pending");
                last_seen = Some(booking);
            }
            Err(err) if err.retryable() => {
                warn!(booking_id, attempt, error = %err, "payment poll failed");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
        if attempt < attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    match (last_seen, last_error) {
        (Some(booking), _) => Ok(Settlement::StillPending { booking, attempts }),
        (None, Some(err)) => Err(err),
        (None, None) => Err(ApiError::internal("payment poll made no attempts")),
    }
}

#[cfg(test)]
#[path = "payments_test.rs"]
mod tests;
