//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own booking rules, map math and background work so route
//! handlers can stay focused on request translation and auth plumbing.

pub mod clustering;
pub mod outbox;
pub mod payments;
pub mod slots;
pub mod throttle;
pub mod validation;
