//! Typed wrappers over the upstream REST endpoints.
//!
//! The backend answers either with the bare resource or wrapped in a
//! `{"data": ...}` envelope (listings sometimes use a named key such as
//! `driveways` or `bookings`); [`decode`] accepts all three.

use chrono::NaiveDate;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{UploadPart, Upstream};
use crate::error::ApiError;
use crate::models::{Booking, BookingStatus, Driveway, NewBooking};

fn decode<T: DeserializeOwned>(value: serde_json::Value, named: Option<&str>) -> Result<T, ApiError> {
    let inner = match value {
        serde_json::Value::Object(mut map) => {
            if let Some(data) = map.remove("data") {
                data
            } else if let Some(list) = named.and_then(|key| map.remove(key)) {
                list
            } else {
                serde_json::Value::Object(map)
            }
        }
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| ApiError::from_status(502, Some(format!("unexpected upstream payload: {e}"))))
}

// =============================================================================
// DRIVEWAYS
// =============================================================================

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn list_driveways(
    upstream: &dyn Upstream,
    params: &[(String, String)],
    token: Option<&str>,
) -> Result<Vec<Driveway>, ApiError> {
    let value = upstream.get("/driveways", params, token).await?;
    decode(value, Some("driveways"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn get_driveway(upstream: &dyn Upstream, id: &str, token: Option<&str>) -> Result<Driveway, ApiError> {
    let value = upstream.get(&format!("/driveways/{id}"), &[], token).await?;
    decode(value, Some("driveway"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn create_driveway(
    upstream: &dyn Upstream,
    body: &serde_json::Value,
    token: &str,
) -> Result<Driveway, ApiError> {
    let value = upstream
        .send(Method::POST, "/driveways", Some(body), Some(token))
        .await?;
    decode(value, Some("driveway"))
}

// =============================================================================
// BOOKINGS
// =============================================================================

/// Bookings for one driveway on one date, used for conflict checks.
///
/// # Errors
///
/// Returns the normalized upstream error.
pub async fn bookings_for_day(
    upstream: &dyn Upstream,
    driveway_id: &str,
    date: NaiveDate,
    token: Option<&str>,
) -> Result<Vec<Booking>, ApiError> {
    let params = vec![
        ("drivewayId".to_owned(), driveway_id.to_owned()),
        ("date".to_owned(), date.format("%Y-%m-%d").to_string()),
    ];
    let value = upstream.get("/bookings", &params, token).await?;
    decode(value, Some("bookings"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn list_bookings(
    upstream: &dyn Upstream,
    params: &[(String, String)],
    token: &str,
) -> Result<Vec<Booking>, ApiError> {
    let value = upstream.get("/bookings", params, Some(token)).await?;
    decode(value, Some("bookings"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn get_booking(upstream: &dyn Upstream, id: &str, token: &str) -> Result<Booking, ApiError> {
    let value = upstream.get(&format!("/bookings/{id}"), &[], Some(token)).await?;
    decode(value, Some("booking"))
}

/// Bypasses the cache; used while polling for a settled payment.
///
/// # Errors
///
/// Returns the normalized upstream error.
pub async fn get_booking_fresh(upstream: &dyn Upstream, id: &str, token: &str) -> Result<Booking, ApiError> {
    let value = upstream
        .get_uncached(&format!("/bookings/{id}"), &[], Some(token))
        .await?;
    decode(value, Some("booking"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn create_booking(upstream: &dyn Upstream, booking: &NewBooking, token: &str) -> Result<Booking, ApiError> {
    let body = serde_json::to_value(booking).map_err(|e| ApiError::internal(e.to_string()))?;
    let value = upstream
        .send(Method::POST, "/bookings", Some(&body), Some(token))
        .await?;
    decode(value, Some("booking"))
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn update_booking_status(
    upstream: &dyn Upstream,
    id: &str,
    status: BookingStatus,
    token: &str,
) -> Result<Booking, ApiError> {
    let body = json!({ "status": status });
    let value = upstream
        .send(Method::PATCH, &format!("/bookings/{id}"), Some(&body), Some(token))
        .await?;
    decode(value, Some("booking"))
}

// =============================================================================
// PAYMENTS
// =============================================================================

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn create_payment_intent(
    upstream: &dyn Upstream,
    body: &serde_json::Value,
    token: &str,
) -> Result<serde_json::Value, ApiError> {
    upstream
        .send(Method::POST, "/payments/create-intent", Some(body), Some(token))
        .await
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn confirm_payment(
    upstream: &dyn Upstream,
    payment_intent_id: &str,
    booking_id: &str,
    token: &str,
) -> Result<serde_json::Value, ApiError> {
    let body = json!({ "paymentIntentId": payment_intent_id, "bookingId": booking_id });
    upstream
        .send(Method::POST, "/payments/confirm-payment", Some(&body), Some(token))
        .await
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn payment_status(upstream: &dyn Upstream, id: &str, token: &str) -> Result<serde_json::Value, ApiError> {
    upstream
        .get(&format!("/payments/status/{id}"), &[], Some(token))
        .await
}

// =============================================================================
// MISC
// =============================================================================

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn list_reviews(upstream: &dyn Upstream, driveway_id: &str) -> Result<serde_json::Value, ApiError> {
    let params = vec![("drivewayId".to_owned(), driveway_id.to_owned())];
    upstream.get("/reviews", &params, None).await
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn reverse_geocode(upstream: &dyn Upstream, lat: f64, lng: f64) -> Result<serde_json::Value, ApiError> {
    let params = vec![("lat".to_owned(), format!("{lat:.6}")), ("lng".to_owned(), format!("{lng:.6}"))];
    upstream.get("/geocoding/reverse", &params, None).await
}

/// # Errors
///
/// Returns the normalized upstream error.
pub async fn upload_images(
    upstream: &dyn Upstream,
    parts: Vec<UploadPart>,
    token: &str,
) -> Result<serde_json::Value, ApiError> {
    upstream.upload("/upload/images", parts, Some(token)).await
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
