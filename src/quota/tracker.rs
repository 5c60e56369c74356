//! Call budget tracking for the rate-limited search endpoint
//!
//! The tracker is the only place that waits on the rate limit. It never lets
//! a call through while the known budget is zero unless it has first observed
//! a fresh reset time and slept past it.

use crate::clock::Clock;
use crate::search::SearchClient;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Remaining call budget of the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    /// Calls left in the current window, never negative
    pub remaining: i64,

    /// When the window resets; `None` while the server does not report one
    pub reset_at: Option<DateTime<Utc>>,
}

/// Tracks the call budget and blocks callers until a call may be issued
pub struct QuotaTracker {
    state: Option<QuotaState>,
    retry_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Creates a tracker that has not probed the quota yet
    ///
    /// # Arguments
    ///
    /// * `retry_interval` - Delay between failed probes and between polls
    /// * `clock` - Wall-clock source used to compare against reset times
    pub fn new(retry_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: None,
            retry_interval,
            clock,
        }
    }

    /// The last observed quota, if any probe has succeeded
    pub fn state(&self) -> Option<QuotaState> {
        self.state
    }

    /// Queries the current quota, retrying until the remote answers
    ///
    /// Failures are logged and retried after the retry interval; this never
    /// returns an error.
    pub async fn check_limit<C: SearchClient + ?Sized>(&mut self, client: &C) -> QuotaState {
        loop {
            match client.check_quota().await {
                Ok(state) => {
                    tracing::info!(
                        "Quota: {} calls remaining, resets at {}",
                        state.remaining,
                        state
                            .reset_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "unknown".to_string())
                    );
                    self.state = Some(state);
                    return state;
                }
                Err(e) => {
                    tracing::warn!("Quota check failed: {}", e);
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Blocks until one call may be issued, then spends it
    ///
    /// With budget left this decrements and returns at once. With the budget
    /// exhausted it polls until a reset time is known, sleeps until one
    /// second past it, and re-checks the quota before spending.
    pub async fn acquire<C: SearchClient + ?Sized>(&mut self, client: &C) {
        let (mut state, mut fresh) = match self.state {
            Some(state) => (state, false),
            None => (self.check_limit(client).await, true),
        };

        loop {
            if state.remaining > 0 {
                state.remaining -= 1;
                self.state = Some(state);
                return;
            }

            match state.reset_at {
                None => {
                    tracing::debug!("Quota exhausted and reset time unknown, polling");
                    tokio::time::sleep(self.retry_interval).await;
                }
                Some(reset_at) => {
                    let wake_at = reset_at + chrono::Duration::seconds(1);
                    let now = self.clock.now();
                    if wake_at > now {
                        let pause = (wake_at - now).to_std().unwrap_or(self.retry_interval);
                        tracing::info!("Quota exhausted, waiting {:?} for the reset", pause);
                        tokio::time::sleep(pause).await;
                    } else if fresh {
                        // The server reported a past reset but no budget yet
                        tokio::time::sleep(self.retry_interval).await;
                    }
                }
            }

            state = self.check_limit(client).await;
            fresh = true;
        }
    }

    /// Whether the budget is known to be spent
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, Some(state) if state.remaining == 0)
    }

    /// Replaces the tracked state without probing
    #[cfg(test)]
    fn set_state(&mut self, state: QuotaState) {
        self.state = Some(state);
    }
}
