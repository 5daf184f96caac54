//! Geocoding and image upload pass-throughs.

use axum::extract::{Multipart, State};
use axum::response::Json;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::routes::auth::AuthToken;
use crate::routes::extract::ApiQuery;
use crate::state::AppState;
use crate::upstream::{UploadPart, api};

pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

/// `GET /api/geocoding/reverse?lat=&lng=` — address for a map point.
pub async fn reverse_geocode(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReverseQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lng) {
        return Err(ApiError::bad_request("lat/lng out of range."));
    }
    let address = api::reverse_geocode(state.upstream.as_ref(), query.lat, query.lng).await?;
    Ok(Json(address))
}

/// Accept one multipart field as an image part.
pub(crate) fn image_part(
    field: Option<&str>,
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<UploadPart, ApiError> {
    let content_type = content_type.unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(ApiError::bad_request(format!("Only image uploads are accepted (got {content_type:?}).")));
    }
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Empty file."));
    }
    Ok(UploadPart {
        field: field.unwrap_or("images").to_owned(),
        file_name: file_name.unwrap_or("upload").to_owned(),
        content_type: Some(content_type.to_owned()),
        bytes,
    })
}

/// `POST /api/uploads/images` — forward driveway photos.
pub async fn upload_images(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if parts.len() == MAX_IMAGES {
            return Err(ApiError::bad_request(format!("At most {MAX_IMAGES} images per upload.")));
        }
        let name = field.name().map(str::to_owned);
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        parts.push(image_part(name.as_deref(), file_name.as_deref(), content_type.as_deref(), bytes.to_vec())?);
    }
    if parts.is_empty() {
        return Err(ApiError::bad_request("No images provided."));
    }

    debug!(count = parts.len(), "forwarding image upload");
    let uploaded = api::upload_images(state.upstream.as_ref(), parts, &token).await?;
    Ok(Json(uploaded))
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;
