//! Caller identity via bearer token extraction.
//!
//! The gateway does not validate tokens itself; it forwards them to the
//! backend, which answers 401 for bad ones. The token also keys per-caller
//! state (slot selections, throttle windows, queued bookings).

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::error::ApiError;

const COOKIE_NAME: &str = "token";

/// Token of an authenticated caller. Rejects with 401 when absent.
pub struct AuthToken(pub String);

/// Token when present; anonymous callers are allowed.
pub struct MaybeAuthToken(pub Option<String>);

impl MaybeAuthToken {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub(crate) fn token_from_parts(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| {
            let (scheme, token) = raw.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_owned())
        })
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        let jar = CookieJar::from_headers(&parts.headers);
        jar.get(COOKIE_NAME)
            .map(Cookie::value)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
    })
}

impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        token_from_parts(parts)
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(token_from_parts(parts)))
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
