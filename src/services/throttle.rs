//! In-memory throttling for live booking validation.
//!
//! DESIGN
//! ======
//! The booking form re-validates on every edit, and each validation costs
//! an upstream booking lookup. Sliding-window counters backed by
//! `HashMap<String, VecDeque<Instant>>` cap how often one caller can do
//! that; the form's own debounce keeps honest clients far below the limit.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::env_parse;

const DEFAULT_LIMIT: usize = 20;
const DEFAULT_WINDOW_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub limit: usize,
    pub window: Duration,
}

impl ThrottleConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            limit: env_parse("VALIDATE_RATE_LIMIT", DEFAULT_LIMIT),
            window: Duration::from_secs(env_parse("VALIDATE_RATE_WINDOW_SECS", DEFAULT_WINDOW_SECS)),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT, window: Duration::from_secs(DEFAULT_WINDOW_SECS) }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("validation rate limit exceeded (max {limit} requests/{window_secs}s)")]
pub struct ThrottleExceeded {
    pub limit: usize,
    pub window_secs: u64,
}

#[derive(Clone)]
pub struct Throttle {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    config: ThrottleConfig,
}

impl Throttle {
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), config }
    }

    /// Check the caller's window, then record the request.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleExceeded` when the caller is over the limit.
    pub fn check_and_record(&self, caller: &str) -> Result<(), ThrottleExceeded> {
        self.check_and_record_at(caller, Instant::now())
    }

    fn check_and_record_at(&self, caller: &str, now: Instant) -> Result<(), ThrottleExceeded> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = self.config.window;

        // Callers who went quiet should not pin memory.
        inner.retain(|_, deque| deque.back().is_some_and(|&last| now.duration_since(last) <= window));

        let deque = inner.entry(caller.to_owned()).or_default();
        prune_window(deque, now, window);
        if deque.len() >= self.config.limit {
            return Err(ThrottleExceeded { limit: self.config.limit, window_secs: window.as_secs() });
        }
        deque.push_back(now);
        Ok(())
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;
