//! Booking validation: time-window admissibility, conflicts and pricing.
//!
//! DESIGN
//! ======
//! `validate_booking` is pure: the caller supplies `today`, the driveway,
//! and the bookings already known for that driveway and date. Callers run
//! the full check again on every input change; nothing is cached between
//! calls. `validate_with_lookup` adds the remote booking fetch.
//!
//! ERROR HANDLING
//! ==============
//! The remote lookup fails open: if existing bookings cannot be fetched the
//! check proceeds with none and records a warning, so a flaky backend never
//! blocks a submission outright. The backend still rejects real conflicts.

use chrono::{Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::BookingRules;
use crate::models::{Booking, BookingStatus, DayOfWeek, Driveway, PaymentStatus};
use crate::upstream::{Upstream, api};

// =============================================================================
// TYPES
// =============================================================================

/// A candidate booking as typed into the booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(with = "crate::models::calendar_date")]
    pub date: NaiveDate,
    #[serde(with = "crate::models::wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "crate::models::wall_clock")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub booking_id: String,
    #[serde(with = "crate::models::wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "crate::models::wall_clock")]
    pub end_time: NaiveTime,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub duration_hours: f64,
    /// Present whenever the time range is non-empty, even if other checks fail.
    pub total_amount: Option<f64>,
}

pub const LOOKUP_FAILED_WARNING: &str = "Existing bookings could not be verified; availability will be confirmed on submission.";

// =============================================================================
// CHECKS
// =============================================================================

/// Run every admissibility check for `request` against `driveway`.
///
/// `existing` should hold the driveway's bookings for `request.date`;
/// bookings for other driveways or dates are ignored.
#[must_use]
pub fn validate_booking(
    request: &BookingRequest,
    driveway: &Driveway,
    existing: &[Booking],
    today: NaiveDate,
    rules: &BookingRules,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if request.date < today {
        errors.push("Cannot book a date in the past.".to_owned());
    } else if let Some(horizon) = today.checked_add_months(Months::new(rules.horizon_months))
        && request.date > horizon
    {
        warnings.push(format!(
            "Bookings more than {} months ahead may be changed by the owner.",
            rules.horizon_months
        ));
    }

    let minutes = (request.end_time - request.start_time).num_minutes();
    let ordered = request.start_time < request.end_time;
    if !ordered {
        errors.push("End time must be after start time.".to_owned());
    } else if minutes < rules.min_duration_minutes {
        errors.push(format!("Minimum booking duration is {} hour(s).", rules.min_duration_minutes / 60));
    } else if minutes > rules.max_duration_minutes {
        warnings.push(format!(
            "Bookings longer than {} hours may need owner approval.",
            rules.max_duration_minutes / 60
        ));
    }

    let day = DayOfWeek::of(request.date);
    match driveway.window_for(day) {
        Some(window) if window.is_available => {
            if ordered && (request.start_time < window.start_time || request.end_time > window.end_time) {
                errors.push(format!(
                    "Driveway is only available {} to {} on {}.",
                    window.start_time.format("%H:%M"),
                    window.end_time.format("%H:%M"),
                    day.display_name()
                ));
            }
        }
        _ => errors.push(format!("Driveway is not available on {}.", day.display_name())),
    }

    let conflicts = if ordered { find_conflicts(request, &driveway.id, existing) } else { Vec::new() };

    let duration_hours = if ordered { minutes_to_hours(minutes) } else { 0.0 };
    let total_amount = ordered.then(|| price(minutes, driveway.price_per_hour));
    let is_valid = errors.is_empty() && !conflicts.iter().any(|c| c.severity == Severity::Error);

    ValidationResult { is_valid, errors, warnings, conflicts, duration_hours, total_amount }
}

/// Fetch the driveway's bookings for the requested date, then validate.
///
/// A failed lookup degrades to "no known conflicts" plus a warning.
pub async fn validate_with_lookup(
    upstream: &dyn Upstream,
    request: &BookingRequest,
    driveway: &Driveway,
    token: Option<&str>,
    today: NaiveDate,
    rules: &BookingRules,
) -> ValidationResult {
    match api::bookings_for_day(upstream, &driveway.id, request.date, token).await {
        Ok(existing) => validate_booking(request, driveway, &existing, today, rules),
        Err(err) => {
            warn!(driveway_id = %driveway.id, status = err.status, error = %err, "booking lookup failed, checking without conflicts");
            let mut result = validate_booking(request, driveway, &[], today, rules);
            result.warnings.push(LOOKUP_FAILED_WARNING.to_owned());
            result
        }
    }
}

/// Existing bookings whose half-open range intersects the request.
#[must_use]
pub fn find_conflicts(request: &BookingRequest, driveway_id: &str, existing: &[Booking]) -> Vec<Conflict> {
    existing
        .iter()
        .filter(|b| b.driveway_id == driveway_id && b.start_date == request.date && b.holds_slot())
        .filter(|b| overlaps(request.start_time, request.end_time, b.start_time, b.end_time))
        .map(|b| {
            let severity = conflict_severity(b);
            let message = match severity {
                Severity::Error => format!(
                    "Overlaps an existing booking from {} to {}.",
                    b.start_time.format("%H:%M"),
                    b.end_time.format("%H:%M")
                ),
                Severity::Warning => format!(
                    "Overlaps a pending hold from {} to {} that may still be confirmed.",
                    b.start_time.format("%H:%M"),
                    b.end_time.format("%H:%M")
                ),
            };
            Conflict { booking_id: b.id.clone(), start_time: b.start_time, end_time: b.end_time, severity, message }
        })
        .collect()
}

/// Half-open interval intersection: `[a_start, a_end)` vs `[b_start, b_end)`.
#[must_use]
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

fn conflict_severity(booking: &Booking) -> Severity {
    if booking.status == BookingStatus::Pending && booking.payment_status != PaymentStatus::Paid {
        Severity::Warning
    } else {
        Severity::Error
    }
}

#[allow(clippy::cast_precision_loss)]
fn minutes_to_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

/// `round(hours × price_per_hour, 2)`.
#[must_use]
pub fn price(minutes: i64, price_per_hour: f64) -> f64 {
    round_cents(minutes_to_hours(minutes) * price_per_hour)
}

#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
