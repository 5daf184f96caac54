//! Gateway configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_SWEEP_SECS: u64 = 300;
pub const DEFAULT_BOOKING_HORIZON_MONTHS: u32 = 6;
pub const DEFAULT_API_MAX_RETRIES: u32 = 3;
pub const DEFAULT_API_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PAYMENT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_PAYMENT_POLL_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_OUTBOX_FLUSH_SECS: u64 = 30;
pub const DEFAULT_OUTBOX_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Upstream REST client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRules {
    /// Dates further ahead than this produce a warning.
    pub horizon_months: u32,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self { horizon_months: DEFAULT_BOOKING_HORIZON_MONTHS, min_duration_minutes: 60, max_duration_minutes: 24 * 60 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxConfig {
    pub flush_interval: Duration,
    pub max_attempts: u32,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub booking: BookingRules,
    pub payment_poll: PaymentPollConfig,
    pub outbox: OutboxConfig,
    pub marker_clustering: bool,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Every variable is optional:
    /// - `PORT`: default 3000
    /// - `PARKWAY_API_URL`: upstream REST base URL
    /// - `CACHE_TTL_SECS`, `CACHE_SWEEP_SECS`: default 300 each
    /// - `BOOKING_HORIZON_MONTHS`: default 6
    /// - `API_MAX_RETRIES`, `API_RETRY_BASE_MS`: default 3 / 1000
    /// - `API_REQUEST_TIMEOUT_SECS`, `API_CONNECT_TIMEOUT_SECS`: default 30 / 10
    /// - `PAYMENT_POLL_INTERVAL_MS`, `PAYMENT_POLL_MAX_ATTEMPTS`: default 3000 / 20
    /// - `MARKER_CLUSTERING`: default off
    /// - `OUTBOX_FLUSH_SECS`, `OUTBOX_MAX_ATTEMPTS`, `OUTBOX_CAPACITY`: default 30 / 5 / 256
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number, or the
    /// upstream URL is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid { var: "PORT", message: e.to_string() })?,
            Err(_) => DEFAULT_PORT,
        };

        let base_url = std::env::var("PARKWAY_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid { var: "PARKWAY_API_URL", message: format!("'{base_url}' is not an http(s) URL") });
        }

        let upstream = UpstreamConfig {
            base_url,
            max_retries: env_parse("API_MAX_RETRIES", DEFAULT_API_MAX_RETRIES),
            retry_base: Duration::from_millis(env_parse("API_RETRY_BASE_MS", DEFAULT_API_RETRY_BASE_MS)),
            request_timeout: Duration::from_secs(env_parse("API_REQUEST_TIMEOUT_SECS", DEFAULT_API_REQUEST_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(env_parse("API_CONNECT_TIMEOUT_SECS", DEFAULT_API_CONNECT_TIMEOUT_SECS)),
        };
        let cache = CacheConfig {
            ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            sweep_interval: Duration::from_secs(env_parse("CACHE_SWEEP_SECS", DEFAULT_CACHE_SWEEP_SECS).max(1)),
        };
        let booking = BookingRules {
            horizon_months: env_parse("BOOKING_HORIZON_MONTHS", DEFAULT_BOOKING_HORIZON_MONTHS),
            ..BookingRules::default()
        };
        let payment_poll = PaymentPollConfig {
            interval: Duration::from_millis(env_parse("PAYMENT_POLL_INTERVAL_MS", DEFAULT_PAYMENT_POLL_INTERVAL_MS)),
            max_attempts: env_parse("PAYMENT_POLL_MAX_ATTEMPTS", DEFAULT_PAYMENT_POLL_MAX_ATTEMPTS),
        };
        let outbox = OutboxConfig {
            flush_interval: Duration::from_secs(env_parse("OUTBOX_FLUSH_SECS", DEFAULT_OUTBOX_FLUSH_SECS).max(1)),
            max_attempts: env_parse("OUTBOX_MAX_ATTEMPTS", DEFAULT_OUTBOX_MAX_ATTEMPTS),
            capacity: env_parse("OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY),
        };

        Ok(Self {
            port,
            upstream,
            cache,
            booking,
            payment_poll,
            outbox,
            marker_clustering: env_bool("MARKER_CLUSTERING").unwrap_or(false),
        })
    }

    /// Defaults with the given upstream base URL.
    #[cfg(test)]
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream: UpstreamConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                max_retries: DEFAULT_API_MAX_RETRIES,
                retry_base: Duration::from_millis(DEFAULT_API_RETRY_BASE_MS),
                request_timeout: Duration::from_secs(DEFAULT_API_REQUEST_TIMEOUT_SECS),
                connect_timeout: Duration::from_secs(DEFAULT_API_CONNECT_TIMEOUT_SECS),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
                sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_SECS),
            },
            booking: BookingRules::default(),
            payment_poll: PaymentPollConfig {
                interval: Duration::from_millis(DEFAULT_PAYMENT_POLL_INTERVAL_MS),
                max_attempts: DEFAULT_PAYMENT_POLL_MAX_ATTEMPTS,
            },
            outbox: OutboxConfig {
                flush_interval: Duration::from_secs(DEFAULT_OUTBOX_FLUSH_SECS),
                max_attempts: DEFAULT_OUTBOX_MAX_ATTEMPTS,
                capacity: DEFAULT_OUTBOX_CAPACITY,
            },
            marker_clustering: false,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
