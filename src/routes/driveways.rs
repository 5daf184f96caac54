//! Driveway listing, map marker and review routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Driveway, GeoPoint};
use crate::routes::auth::{AuthToken, MaybeAuthToken};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::clustering::{self, Bounds, Cluster, Marker};
use crate::state::AppState;
use crate::upstream::api;

const DEFAULT_ZOOM: u8 = 12;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub search: Option<String>,
}

impl ListQuery {
    fn origin(&self) -> Option<GeoPoint> {
        Some(GeoPoint { lat: self.lat?, lng: self.lng? })
    }

    /// Params forwarded upstream. Coordinates stay local: sorting happens here.
    fn upstream_params(&self) -> Vec<(String, String)> {
        self.search
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| ("search".to_owned(), s.trim().to_owned()))
            .collect()
    }
}

/// `GET /api/driveways` — list driveways, nearest-first when `lat,lng` given.
pub async fn list_driveways(
    State(state): State<AppState>,
    token: MaybeAuthToken,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Driveway>>, ApiError> {
    let mut driveways = api::list_driveways(state.upstream.as_ref(), &query.upstream_params(), token.as_deref()).await?;
    if let Some(origin) = query.origin() {
        clustering::sort_by_distance(&mut driveways, origin);
    }
    Ok(Json(driveways))
}

/// `GET /api/driveways/:id` — fetch one driveway.
pub async fn get_driveway(
    State(state): State<AppState>,
    token: MaybeAuthToken,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Driveway>, ApiError> {
    let driveway = api::get_driveway(state.upstream.as_ref(), &id, token.as_deref()).await?;
    Ok(Json(driveway))
}

/// `POST /api/driveways` — list a new driveway.
pub async fn create_driveway(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> Result<(StatusCode, Json<Driveway>), ApiError> {
    if body.get("pricePerHour").and_then(serde_json::Value::as_f64).is_none_or(|p| p <= 0.0) {
        return Err(ApiError::bad_request("pricePerHour must be a positive number."));
    }
    let driveway = api::create_driveway(state.upstream.as_ref(), &body, &token).await?;
    tracing::info!(driveway_id = %driveway.id, "driveway created");
    Ok((StatusCode::CREATED, Json(driveway)))
}

#[derive(Debug, Deserialize)]
pub struct MarkerQuery {
    /// Map zoom as the client reports it; fractional while pinching.
    pub zoom: Option<f64>,
}

impl MarkerQuery {
    /// Integer zoom level. Fractions floor, out-of-range values clamp, and
    /// a missing or non-finite zoom falls back to the default.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn level(&self) -> u8 {
        match self.zoom {
            Some(zoom) if zoom.is_finite() => zoom.clamp(0.0, f64::from(clustering::MAX_ZOOM)).floor() as u8,
            _ => DEFAULT_ZOOM,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarkerResponse {
    pub zoom: u8,
    pub clustered: bool,
    pub clusters: Vec<Cluster>,
    pub bounds: Option<Bounds>,
    pub center: Option<GeoPoint>,
}

/// `GET /api/driveways/markers?zoom=` — map pins, clustered when enabled.
pub async fn markers(
    State(state): State<AppState>,
    token: MaybeAuthToken,
    ApiQuery(query): ApiQuery<MarkerQuery>,
) -> Result<Json<MarkerResponse>, ApiError> {
    let driveways = api::list_driveways(state.upstream.as_ref(), &[], token.as_deref()).await?;
    let markers = Marker::from_driveways(&driveways);
    let zoom = query.level();
    let enabled = state.config.marker_clustering;
    let points: Vec<GeoPoint> = markers.iter().map(|m| m.position).collect();

    Ok(Json(MarkerResponse {
        zoom,
        clustered: enabled,
        clusters: clustering::cluster_markers(&markers, zoom, enabled),
        bounds: clustering::bounds(&points),
        center: clustering::center(&points),
    }))
}

/// `GET /api/driveways/:id/reviews` — reviews for one driveway.
pub async fn reviews(State(state): State<AppState>, ApiPath(id): ApiPath<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let reviews = api::list_reviews(state.upstream.as_ref(), &id).await?;
    Ok(Json(reviews))
}

#[cfg(test)]
#[path = "driveways_test.rs"]
mod tests;
