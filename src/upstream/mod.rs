//! HTTP client for the Parkway REST backend.
//!
//! DESIGN
//! ======
//! `Upstream` is the transport seam: raw JSON in, raw JSON out, with the
//! caller's bearer token forwarded. `ApiClient` is the production
//! implementation (reqwest + TTL cache + retries); tests substitute an
//! in-memory fake. Typed endpoint wrappers live in [`api`] and decode the
//! JSON, so a fake only has to route by path.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is normalized into [`ApiError`]. GETs retry up to
//! `max_retries` times with linear backoff (`retry_base × attempt`) unless
//! the failure is a 4xx other than 429. Mutations are never retried.

pub mod api;
pub mod cache;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::{ApiError, ErrorCode};
use cache::{CacheKey, CacheStats, ResponseCache};

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// One file in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// `GET path?params`. May be served from cache.
    async fn get(&self, path: &str, params: &[(String, String)], token: Option<&str>)
    -> Result<serde_json::Value, ApiError>;

    /// `GET path?params` straight from the backend. Never read from or
    /// written to the cache; used for polling.
    async fn get_uncached(
        &self,
        path: &str,
        params: &[(String, String)],
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError>;

    /// POST/PUT/PATCH/DELETE with an optional JSON body. Never retried.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError>;

    /// Multipart POST.
    async fn upload(&self, path: &str, parts: Vec<UploadPart>, token: Option<&str>)
    -> Result<serde_json::Value, ApiError>;

    fn cache_stats(&self) -> CacheStats {
        CacheStats { entries: 0, hits: 0, misses: 0 }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: ResponseCache,
    max_retries: u32,
    retry_base: std::time::Duration,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &UpstreamConfig, cache: ResponseCache) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            cache,
            max_retries: config.max_retries,
            retry_base: config.retry_base,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_once(
        &self,
        path: &str,
        params: &[(String, String)],
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .request(Method::GET, path, token)
            .query(params)
            .send()
            .await
            .map_err(ApiError::network)?;
        read_json(response).await
    }

    async fn get_with_retry(
        &self,
        path: &str,
        params: &[(String, String)],
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut attempt = 0;
        loop {
            match self.get_once(path, params, token).await {
                Ok(value) => return Ok(value),
                Err(err) if err.retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_base * attempt;
                    warn!(path, attempt, status = err.status, ?delay, "upstream GET failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn after_mutation(&self, method: &Method, path: &str) {
        if cache::invalidates(method.as_str(), path) {
            debug!(%method, path, "mutation invalidates response cache");
            self.cache.clear();
        }
    }
}

#[async_trait]
impl Upstream for ApiClient {
    async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let key = cache_key(path, params, token);
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = key.as_str(), "cache hit");
            return Ok(hit);
        }

        // A mutation that lands while this read is in flight bumps the
        // generation; the response is still returned but not stored.
        let generation = self.cache.generation();
        let value = self.get_with_retry(path, params, token).await?;
        self.cache.insert_if_generation(key, value.clone(), generation);
        Ok(value)
    }

    async fn get_uncached(
        &self,
        path: &str,
        params: &[(String, String)],
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        self.get_with_retry(path, params, token).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut builder = self.request(method.clone(), path, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let result = match builder.send().await {
            Ok(response) => read_json(response).await,
            Err(e) => Err(ApiError::network(e)),
        };
        // A failed mutation may still have landed upstream.
        if result.is_ok() || result.as_ref().is_err_and(ApiError::is_unreachable) {
            self.after_mutation(&method, path);
        }
        result
    }

    async fn upload(
        &self,
        path: &str,
        parts: Vec<UploadPart>,
        token: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            let mut file = reqwest::multipart::Part::bytes(part.bytes).file_name(part.file_name);
            if let Some(content_type) = part.content_type.as_deref() {
                file = file
                    .mime_str(content_type)
                    .map_err(|e| ApiError::bad_request(format!("invalid content type: {e}")))?;
            }
            form = form.part(part.field, file);
        }
        let response = self
            .request(Method::POST, path, token)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::network)?;
        read_json(response).await
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Authenticated GETs are cached per caller so one user's bookings never
/// answer another user's request.
fn cache_key(path: &str, params: &[(String, String)], token: Option<&str>) -> CacheKey {
    match token {
        Some(token) => {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let mut scoped = params.to_vec();
            scoped.push(("~caller".to_owned(), format!("{:016x}", hasher.finish())));
            CacheKey::new("GET", path, &scoped)
        }
        None => CacheKey::new("GET", path, params),
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = response.status().as_u16();
    let text = response.text().await.map_err(ApiError::network)?;
    if !(200..300).contains(&status) {
        return Err(ApiError::from_response_body(status, &text));
    }
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::from_status(502, Some(format!("invalid upstream JSON: {e}"))))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
