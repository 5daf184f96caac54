//! Multi-slot selection: driveways picked for one booking transaction.
//!
//! DESIGN
//! ======
//! Each booking session (keyed by the caller's auth token) owns an ordered
//! list of selected slots. A slot ties a driveway to the map position the
//! user clicked, so the UI can anchor its popover. Selections live only in
//! memory: clearing a session (modal close) discards them, and sessions
//! left idle are pruned by a background task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BookingRules;
use crate::models::Driveway;
use crate::services::validation::{self, BookingRequest, ValidationResult};
use crate::upstream::{Upstream, api};

pub const MAX_SLOTS_PER_SESSION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSlot {
    pub driveway: Driveway,
    pub position: ScreenPoint,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("at most {max} driveways can be booked together")]
    TooMany { max: usize },
    #[error("driveway {0} is not selected")]
    NotSelected(String),
}

struct Session {
    slots: Vec<SelectedSlot>,
    touched: Instant,
}

#[derive(Clone, Default)]
pub struct SlotSelections {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SlotSelections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add a driveway to the session, or move its anchor if already selected.
    ///
    /// # Errors
    ///
    /// Returns `TooMany` when the session is full.
    pub fn select(&self, session: &str, slot: SelectedSlot) -> Result<Vec<SelectedSlot>, SlotError> {
        self.select_at(session, slot, Instant::now())
    }

    fn select_at(&self, session: &str, slot: SelectedSlot, now: Instant) -> Result<Vec<SelectedSlot>, SlotError> {
        let mut sessions = self.lock();
        let entry = sessions
            .entry(session.to_owned())
            .or_insert_with(|| Session { slots: Vec::new(), touched: now });
        entry.touched = now;

        if let Some(existing) = entry
            .slots
            .iter_mut()
            .find(|s| s.driveway.id == slot.driveway.id)
        {
            *existing = slot;
        } else {
            if entry.slots.len() >= MAX_SLOTS_PER_SESSION {
                return Err(SlotError::TooMany { max: MAX_SLOTS_PER_SESSION });
            }
            entry.slots.push(slot);
        }
        Ok(entry.slots.clone())
    }

    /// # Errors
    ///
    /// Returns `NotSelected` if the driveway is not in the session.
    pub fn remove(&self, session: &str, driveway_id: &str) -> Result<Vec<SelectedSlot>, SlotError> {
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(session) else {
            return Err(SlotError::NotSelected(driveway_id.to_owned()));
        };
        let before = entry.slots.len();
        entry.slots.retain(|s| s.driveway.id != driveway_id);
        if entry.slots.len() == before {
            return Err(SlotError::NotSelected(driveway_id.to_owned()));
        }
        entry.touched = Instant::now();
        Ok(entry.slots.clone())
    }

    #[must_use]
    pub fn list(&self, session: &str) -> Vec<SelectedSlot> {
        self.lock()
            .get(session)
            .map(|s| s.slots.clone())
            .unwrap_or_default()
    }

    /// Discard the whole selection. Returns how many slots were dropped.
    pub fn clear(&self, session: &str) -> usize {
        self.lock().remove(session).map_or(0, |s| s.slots.len())
    }

    /// Drop sessions untouched for longer than `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        self.prune_idle_at(Instant::now(), max_idle)
    }

    fn prune_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.touched) <= max_idle);
        before - sessions.len()
    }
}

/// Spawn the idle-session pruner. Returns a handle for shutdown.
pub fn spawn_prune_task(slots: SlotSelections, every: Duration, max_idle: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let pruned = slots.prune_idle(max_idle);
            if pruned > 0 {
                debug!(pruned, "idle slot selections pruned");
            }
        }
    })
}

// =============================================================================
// QUOTE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuote {
    pub driveway_id: String,
    pub result: ValidationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionQuote {
    pub all_valid: bool,
    pub slots: Vec<SlotQuote>,
    /// Sum over slots that priced successfully.
    pub total_amount: f64,
}

pub const SNAPSHOT_PRICE_WARNING: &str = "Current listing could not be loaded; quoted from the listing as selected.";
pub const DELISTED_ERROR: &str = "This driveway is no longer listed.";

/// Validate and price the same time range on every selected driveway.
///
/// Each driveway is re-fetched so the quote uses its current price and
/// availability, not the copy taken when it was selected. A driveway the
/// backend no longer has is quoted invalid; any other lookup failure falls
/// back to the selected copy with a warning. Lookups run concurrently and
/// results keep selection order.
pub async fn quote_selection(
    upstream: &dyn Upstream,
    slots: &[SelectedSlot],
    request: &BookingRequest,
    token: Option<&str>,
    today: NaiveDate,
    rules: &BookingRules,
) -> SelectionQuote {
    let quotes: Vec<SlotQuote> = join_all(slots.iter().map(|slot| async move {
        let driveway_id = slot.driveway.id.clone();
        let result = match api::get_driveway(upstream, &driveway_id, token).await {
            Ok(current) => validation::validate_with_lookup(upstream, request, &current, token, today, rules).await,
            Err(err) if err.status == 404 => ValidationResult {
                is_valid: false,
                errors: vec![DELISTED_ERROR.to_owned()],
                warnings: Vec::new(),
                conflicts: Vec::new(),
                duration_hours: 0.0,
                total_amount: None,
            },
            Err(err) => {
                warn!(driveway_id = %driveway_id, error = %err, "driveway refresh failed, quoting selected copy");
                let mut result =
                    validation::validate_with_lookup(upstream, request, &slot.driveway, token, today, rules).await;
                result.warnings.push(SNAPSHOT_PRICE_WARNING.to_owned());
                result
            }
        };
        SlotQuote { driveway_id, result }
    }))
    .await;
    let total = quotes.iter().filter_map(|q| q.result.total_amount).sum::<f64>();
    SelectionQuote {
        all_valid: !quotes.is_empty() && quotes.iter().all(|q| q.result.is_valid),
        slots: quotes,
        total_amount: validation::round_cents(total),
    }
}

#[cfg(test)]
#[path = "slots_test.rs"]
mod tests;
