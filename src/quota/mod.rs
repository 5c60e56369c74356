//! Quota tracking for the rate-limited search endpoint

mod tracker;

pub use tracker::{QuotaState, QuotaTracker};
