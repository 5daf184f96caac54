//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Browser clients talk only to these `/api` routes. Every handler forwards
//! to the Parkway backend through `AppState::upstream`, adding validation,
//! caching, clustering, and the offline outbox on the way.

pub mod auth;
pub mod bookings;
pub mod driveways;
pub mod extract;
pub mod media;
pub mod payments;
pub mod slots;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::upstream::cache::CacheStats;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/driveways", get(driveways::list_driveways).post(driveways::create_driveway))
        .route("/api/driveways/markers", get(driveways::markers))
        .route("/api/driveways/{id}", get(driveways::get_driveway))
        .route("/api/driveways/{id}/reviews", get(driveways::reviews))
        .route("/api/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/api/bookings/validate", post(bookings::validate))
        .route("/api/bookings/outbox", get(bookings::outbox))
        .route("/api/bookings/{id}", get(bookings::get_booking).patch(bookings::update_status))
        .route("/api/payments/intent", post(payments::create_intent))
        .route("/api/payments/confirm", post(payments::confirm))
        .route("/api/payments/status/{id}", get(payments::status))
        .route("/api/geocoding/reverse", get(media::reverse_geocode))
        .route("/api/uploads/images", post(media::upload_images))
        .route("/api/slots", get(slots::list).post(slots::select).delete(slots::clear))
        .route("/api/slots/quote", post(slots::quote))
        .route("/api/slots/{driveway_id}", delete(slots::remove))
        .route("/api/cache/stats", get(cache_stats))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.upstream.cache_stats())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
