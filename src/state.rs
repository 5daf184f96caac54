//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the typed config, the upstream transport, per-session slot
//! selections, the offline booking outbox, and the validation throttle.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::outbox::Outbox;
use crate::services::slots::SlotSelections;
use crate::services::throttle::{Throttle, ThrottleConfig};
use crate::upstream::Upstream;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub upstream: Arc<dyn Upstream>,
    pub slots: SlotSelections,
    pub outbox: Outbox,
    pub throttle: Throttle,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, upstream: Arc<dyn Upstream>, throttle: ThrottleConfig) -> Self {
        let outbox = Outbox::new(&config.outbox);
        Self {
            config: Arc::new(config),
            upstream,
            slots: SlotSelections::new(),
            outbox,
            throttle: Throttle::new(throttle),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
