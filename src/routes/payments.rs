//! Payment routes.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::auth::AuthToken;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::payments::{self, Settlement};
use crate::state::AppState;
use crate::upstream::api;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub payment_intent_id: String,
    pub booking_id: String,
}

/// `POST /api/payments/intent` — create a payment intent for a booking.
pub async fn create_intent(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.get("bookingId").and_then(serde_json::Value::as_str).is_none_or(str::is_empty) {
        return Err(ApiError::bad_request("bookingId is required."));
    }
    let intent = api::create_payment_intent(state.upstream.as_ref(), &body, &token).await?;
    Ok(Json(intent))
}

/// `POST /api/payments/confirm` — confirm, then wait for the booking to settle.
pub async fn confirm(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<Json<Settlement>, ApiError> {
    let upstream = state.upstream.as_ref();
    api::confirm_payment(upstream, &body.payment_intent_id, &body.booking_id, &token).await?;
    let settlement = payments::await_settlement(upstream, &body.booking_id, &token, &state.config.payment_poll).await?;
    Ok(Json(settlement))
}

/// `GET /api/payments/status/:id` — payment status for a booking.
pub async fn status(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = api::payment_status(state.upstream.as_ref(), &id, &token).await?;
    Ok(Json(status))
}

#[cfg(test)]
#[path = "payments_test.rs"]
mod tests;
