//! Multi-slot selection routes, keyed by the caller's token.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::auth::AuthToken;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::routes::bookings::today;
use crate::services::slots::{self, ScreenPoint, SelectedSlot, SelectionQuote, SlotError};
use crate::services::validation::BookingRequest;
use crate::state::AppState;
use crate::upstream::api;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBody {
    pub driveway_id: String,
    pub position: ScreenPoint,
}

pub(crate) fn slot_error(err: &SlotError) -> ApiError {
    match err {
        SlotError::TooMany { .. } => ApiError::from_status(409, Some(err.to_string())),
        SlotError::NotSelected(_) => ApiError::not_found(err.to_string()),
    }
}

/// `GET /api/slots` — current selection.
pub async fn list(State(state): State<AppState>, AuthToken(token): AuthToken) -> Json<Vec<SelectedSlot>> {
    Json(state.slots.list(&token))
}

/// `POST /api/slots` — add a driveway, or move its anchor.
pub async fn select(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<SelectBody>,
) -> Result<Json<Vec<SelectedSlot>>, ApiError> {
    let driveway = api::get_driveway(state.upstream.as_ref(), &body.driveway_id, Some(&token)).await?;
    let selection = state
        .slots
        .select(&token, SelectedSlot { driveway, position: body.position })
        .map_err(|e| slot_error(&e))?;
    Ok(Json(selection))
}

/// `DELETE /api/slots/:driveway_id` — drop one driveway.
pub async fn remove(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiPath(driveway_id): ApiPath<String>,
) -> Result<Json<Vec<SelectedSlot>>, ApiError> {
    state
        .slots
        .remove(&token, &driveway_id)
        .map(Json)
        .map_err(|e| slot_error(&e))
}

/// `DELETE /api/slots` — discard the whole selection.
pub async fn clear(State(state): State<AppState>, AuthToken(token): AuthToken) -> Json<serde_json::Value> {
    let removed = state.slots.clear(&token);
    Json(json!({ "removed": removed }))
}

/// `POST /api/slots/quote` — validate and price one range across the selection.
pub async fn quote(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(request): ApiJson<BookingRequest>,
) -> Result<Json<SelectionQuote>, ApiError> {
    let selection = state.slots.list(&token);
    if selection.is_empty() {
        return Err(ApiError::bad_request("No driveways selected."));
    }
    let quote = slots::quote_selection(
        state.upstream.as_ref(),
        &selection,
        &request,
        Some(&token),
        today(),
        &state.config.booking,
    )
    .await;
    Ok(Json(quote))
}

#[cfg(test)]
#[path = "slots_test.rs"]
mod tests;
