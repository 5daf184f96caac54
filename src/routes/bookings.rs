//! Booking routes.
//!
//! DESIGN
//! ======
//! Every booking flow goes through the same validator: `validate` answers
//! it directly, `create` runs it first and only forwards admissible
//! requests. When the upstream cannot be reached at submission time the
//! request is parked in the outbox and the caller gets `202 Accepted`.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{Booking, BookingStatus, NewBooking};
use crate::routes::auth::AuthToken;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::outbox::QueuedBooking;
use crate::services::validation::{self, BookingRequest, ValidationResult};
use crate::state::AppState;
use crate::upstream::api;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    pub driveway_id: String,
    #[serde(flatten)]
    pub request: BookingRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    pub driveway_id: String,
    #[serde(flatten)]
    pub request: BookingRequest,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: BookingStatus,
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// `POST /api/bookings/validate` — check a candidate booking.
pub async fn validate(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<ValidateBody>,
) -> Result<Json<ValidationResult>, ApiError> {
    state
        .throttle
        .check_and_record(&token)
        .map_err(|e| ApiError::from_status(429, Some(e.to_string())))?;

    let driveway = api::get_driveway(state.upstream.as_ref(), &body.driveway_id, Some(&token)).await?;
    let result = validation::validate_with_lookup(
        state.upstream.as_ref(),
        &body.request,
        &driveway,
        Some(&token),
        today(),
        &state.config.booking,
    )
    .await;
    Ok(Json(result))
}

/// `GET /api/bookings` — the caller's bookings. Query params pass through.
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiQuery(query): ApiQuery<BTreeMap<String, String>>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let params: Vec<(String, String)> = query.into_iter().collect();
    let bookings = api::list_bookings(state.upstream.as_ref(), &params, &token).await?;
    Ok(Json(bookings))
}

/// `POST /api/bookings` — validate, then create.
///
/// Answers 422 with the validation result when the request is not
/// admissible, 201 with the booking on success, and 202 when the upstream
/// is unreachable and the request was queued.
pub async fn create_booking(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<CreateBookingBody>,
) -> Result<Response, ApiError> {
    let upstream = state.upstream.as_ref();
    let driveway = api::get_driveway(upstream, &body.driveway_id, Some(&token)).await?;
    let result = validation::validate_with_lookup(
        upstream,
        &body.request,
        &driveway,
        Some(&token),
        today(),
        &state.config.booking,
    )
    .await;

    let Some(total_amount) = result.total_amount.filter(|_| result.is_valid) else {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(result)).into_response());
    };

    let new_booking = NewBooking {
        driveway_id: driveway.id.clone(),
        start_date: body.request.date,
        start_time: body.request.start_time,
        end_time: body.request.end_time,
        total_amount,
        special_requests: body.special_requests,
    };

    match api::create_booking(upstream, &new_booking, &token).await {
        Ok(booking) => {
            info!(booking_id = %booking.id, driveway_id = %driveway.id, "booking created");
            Ok((StatusCode::CREATED, Json(booking)).into_response())
        }
        Err(err) if err.is_unreachable() => {
            let id = state
                .outbox
                .enqueue(&token, new_booking)
                .map_err(|e| ApiError::unavailable(e.to_string()))?;
            warn!(outbox_id = %id, status = err.status, error = %err, "upstream unreachable, booking queued");
            Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true, "outboxId": id }))).into_response())
        }
        Err(err) => Err(err),
    }
}

/// `GET /api/bookings/:id` — one booking.
pub async fn get_booking(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = api::get_booking(state.upstream.as_ref(), &id, &token).await?;
    Ok(Json(booking))
}

/// `PATCH /api/bookings/:id` — change booking status.
pub async fn update_status(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Booking>, ApiError> {
    let booking = api::update_booking_status(state.upstream.as_ref(), &id, body.status, &token).await?;
    info!(booking_id = %booking.id, status = ?booking.status, "booking status updated");
    Ok(Json(booking))
}

/// `GET /api/bookings/outbox` — the caller's queued submissions.
pub async fn outbox(State(state): State<AppState>, AuthToken(token): AuthToken) -> Json<Vec<QueuedBooking>> {
    Json(state.outbox.pending_for(&token))
}

#[cfg(test)]
#[path = "bookings_test.rs"]
mod tests;
