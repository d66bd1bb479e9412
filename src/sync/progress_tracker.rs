//! Refresh bookkeeping for the state synchronizer.
//!
//! The tracker counts how refreshes ended (applied, discarded as stale, failed) so the
//! outcome of a session's reconciliation can be summarised when the session ends.

use chrono::{DateTime, Utc};
use tracing::info;

/// Counters for the refreshes run during one session.
#[derive(Debug, Clone, Default)]
pub struct RefreshTracker {
    /// Refreshes that took a ticket
    started: u64,
    /// Refreshes whose snapshot replaced the local one
    applied: u64,
    /// Refreshes superseded by a newer one or by a session change
    discarded: u64,
    /// Refreshes that could not read the full state
    failed: u64,
    /// Ticket of the last applied snapshot
    last_applied_sequence: Option<u64>,
    last_applied_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&mut self) {
        self.started += 1;
    }

    pub fn record_applied(&mut self, sequence: u64, at: DateTime<Utc>) {
        self.applied += 1;
        self.last_applied_sequence = Some(sequence);
        self.last_applied_at = Some(at);
    }

    pub fn record_discarded(&mut self) {
        self.discarded += 1;
    }

    pub fn record_failed(&mut self, error: impl ToString) {
        self.failed += 1;
        self.last_error = Some(error.to_string());
    }

    /// Refreshes that took a ticket but have not ended yet
    pub fn in_flight(&self) -> u64 {
        self.started
            .saturating_sub(self.applied + self.discarded + self.failed)
    }

    pub fn log_summary(&self) {
        if self.started > 0 {
            info!("{}", self.get_stats().summary());
        }
    }

    pub fn get_stats(&self) -> RefreshStats {
        RefreshStats {
            started: self.started,
            applied: self.applied,
            discarded: self.discarded,
            failed: self.failed,
            in_flight: self.in_flight(),
            last_applied_sequence: self.last_applied_sequence,
            last_applied_at: self.last_applied_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Statistics about the refreshes of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStats {
    pub started: u64,
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub last_applied_sequence: Option<u64>,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RefreshStats {
    /// Get a human-readable summary of the refresh statistics
    pub fn summary(&self) -> String {
        format!(
            "Refreshes: {} started, {} applied, {} stale, {} failed{}",
            self.started,
            self.applied,
            self.discarded,
            self.failed,
            match &self.last_error {
                Some(error) => format!(" (last error: {error})"),
                None => String::new(),
            }
        )
    }
}
