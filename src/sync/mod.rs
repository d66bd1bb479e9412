//! State synchronization for the connected account.
//!
//! The [`StateSynchronizer`] owns the only local copy of ledger state: an
//! [`AccountSnapshot`] that is rebuilt from a full set of ledger reads and swapped in as
//! a whole. Refreshes run after every confirmed write and on a periodic timer while a
//! session is active. Overlapping refreshes are ordered by the ticket each one takes when
//! it starts; a result that finishes after a newer one has been applied is dropped.

/// Refresh counters and their summary
pub mod progress_tracker;
/// Periodic refresh task bound to a session identity
mod scheduler;
/// The account snapshot type
mod snapshot;
/// Synchronizer implementation
mod synchronizer;

pub use progress_tracker::{RefreshStats, RefreshTracker};
pub use scheduler::PeriodicRefresh;
pub use snapshot::AccountSnapshot;
pub use synchronizer::{DEFAULT_REFRESH_INTERVAL, FETCH_FAILED_MESSAGE, StateSynchronizer};

use ethers::types::Address;
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
	#[error(transparent)]
	Remote(#[from] LedgerError),

	/// Not a failure: the result was superseded and has been dropped.
	#[error("refresh #{sequence} for {account:?} was superseded")]
	StaleRefreshDiscarded { account: Address, sequence: u64 },
}
