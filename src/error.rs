//! Normalized API errors.
//!
//! DESIGN
//! ======
//! Every failure that reaches a client, whether it came from the upstream
//! backend, the network, or the gateway itself, is flattened into one shape:
//! `{message, status, code, timestamp}`. Status-specific default messages
//! are used when the upstream body carries no message of its own. Status 0
//! means the request never got a response (network failure or timeout).

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grepable error codes and retry hints, shared by every error the gateway surfaces.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (status {status}, {code})")]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ApiError {
    /// Build an error for an HTTP status, using the upstream message when present.
    #[must_use]
    pub fn from_status(status: u16, upstream_message: Option<String>) -> Self {
        let message = upstream_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(status).to_owned());
        Self { message, status, code: code_for_status(status).to_owned(), timestamp: Utc::now() }
    }

    /// Build an error from an upstream response body, pulling `message` or `error`.
    #[must_use]
    pub fn from_response_body(status: u16, body: &str) -> Self {
        Self::from_status(status, extract_message(body))
    }

    /// The request never produced a response.
    #[must_use]
    pub fn network(detail: impl std::fmt::Display) -> Self {
        tracing::debug!(%detail, "network failure");
        Self::from_status(0, None)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_status(400, Some(message.into()))
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::from_status(401, None)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, Some(message.into()))
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::from_status(503, Some(message.into()))
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::from_status(500, Some(message.into()))
    }

    /// True when the upstream could not be reached or failed on its side.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.status == 0 || self.status >= 500
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        code_for_status(self.status)
    }

    fn retryable(&self) -> bool {
        matches!(self.status, 0 | 429 | 500..=599)
    }
}

// Extractor rejections keep their status and detail but take the same shape
// as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_status(rejection.status().as_u16(), Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::from_status(rejection.status().as_u16(), Some(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::from_status(rejection.status().as_u16(), Some(rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(flatten)]
    error: &'a ApiError,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Network failures surface as a bad gateway; the body keeps status 0.
        let http_status = match self.status {
            0 => StatusCode::BAD_GATEWAY,
            s => StatusCode::from_u16(s).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };
        let redirect = (self.status == 401).then_some("/login");
        (http_status, Json(ErrorBody { error: &self, redirect })).into_response()
    }
}

#[must_use]
pub fn default_message(status: u16) -> &'static str {
    match status {
        0 => "Network error. Please check your connection and try again.",
        400 => "Invalid request. Please check your input.",
        401 => "Your session has expired. Please log in again.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        409 => "This request conflicts with the current state of the resource.",
        422 => "The submitted data failed validation.",
        429 => "Too many requests. Please slow down and try again.",
        500..=599 => "Server error. Please try again later.",
        _ => "An unexpected error occurred.",
    }
}

#[must_use]
pub fn code_for_status(status: u16) -> &'static str {
    match status {
        0 => "E_NETWORK",
        400 => "E_BAD_REQUEST",
        401 => "E_UNAUTHORIZED",
        403 => "E_FORBIDDEN",
        404 => "E_NOT_FOUND",
        409 => "E_CONFLICT",
        422 => "E_VALIDATION",
        429 => "E_RATE_LIMITED",
        500..=599 => "E_SERVER",
        _ => "E_UNKNOWN",
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
