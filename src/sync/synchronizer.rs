use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use ethers::types::Address;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::{AccountSnapshot, PeriodicRefresh, RefreshStats, RefreshTracker, SyncError};
use crate::events::{ClientEvent, EventDispatcher};
use crate::ledger::{LedgerError, LedgerGateway};
use crate::notification::{NotificationCenter, NotificationKind};
use crate::session::{SessionManager, same_identity};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch user data";

pub struct StateSynchronizer {
	gateway: Arc<dyn LedgerGateway>,
	session: Arc<SessionManager>,
	notifications: Arc<NotificationCenter>,
	events: Arc<EventDispatcher>,
	refresh_interval: Duration,
	snapshot: watch::Sender<Option<AccountSnapshot>>,
	/// Last ticket handed out.
	next_sequence: AtomicU64,
	/// Ticket of the snapshot currently applied. Only written under the snapshot lock.
	applied_sequence: AtomicU64,
	tracker: Mutex<RefreshTracker>,
	periodic: Mutex<Option<PeriodicRefresh>>,
}

impl StateSynchronizer {
	pub fn new(
		gateway: Arc<dyn LedgerGateway>,
		session: Arc<SessionManager>,
		notifications: Arc<NotificationCenter>,
		events: Arc<EventDispatcher>,
		refresh_interval: Duration,
	) -> Self {
		let (snapshot, _) = watch::channel(None);
		Self {
			gateway,
			session,
			notifications,
			events,
			refresh_interval,
			snapshot,
			next_sequence: AtomicU64::new(0),
			applied_sequence: AtomicU64::new(0),
			tracker: Mutex::new(RefreshTracker::new()),
			periodic: Mutex::new(None),
		}
	}

	fn tracker(&self) -> MutexGuard<'_, RefreshTracker> {
		self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Reads the full state of `account` and replaces the snapshot with it.
	///
	/// The snapshot is only replaced when every read succeeded, no newer refresh has been
	/// applied in the meantime, and `account` is still the session identity. A failed
	/// refresh keeps the previous snapshot and shows an error notification.
	pub async fn refresh(&self, account: Address) -> Result<AccountSnapshot, SyncError> {
		let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
		self.tracker().record_started();
		debug!("Refresh #{} for {:?} started", sequence, account);

		let snapshot = match self.read_snapshot(account, sequence).await {
			Ok(snapshot) => snapshot,
			Err(e) if sequence < self.applied_sequence.load(Ordering::SeqCst) => {
				debug!(
					"Refresh #{} for {:?} failed after a newer one applied: {}",
					sequence, account, e
				);
				return Err(self.discard(account, sequence).await);
			}
			Err(e) => {
				error!("Refresh #{} for {:?} failed: {}", sequence, account, e);
				self.tracker().record_failed(&e);
				self.events
					.dispatch(&ClientEvent::RefreshFailed {
						account,
						error: e.to_string(),
					})
					.await;
				if self.is_current_identity(account) {
					self.notifications.show(
						format!("{}: {}", FETCH_FAILED_MESSAGE, e),
						NotificationKind::Error,
					);
				}
				return Err(e.into());
			}
		};

		let applied = self.snapshot.send_if_modified(|current| {
			if !self.is_current_identity(account)
				|| sequence < self.applied_sequence.load(Ordering::SeqCst)
			{
				return false;
			}
			self.applied_sequence.store(sequence, Ordering::SeqCst);
			*current = Some(snapshot.clone());
			true
		});

		if !applied {
			debug!("Refresh #{} for {:?} is stale, discarding", sequence, account);
			return Err(self.discard(account, sequence).await);
		}

		self.tracker()
			.record_applied(sequence, snapshot.refreshed_at);
		self.events
			.dispatch(&ClientEvent::SnapshotReplaced {
				sequence,
				snapshot: snapshot.clone(),
			})
			.await;
		Ok(snapshot)
	}

	async fn discard(&self, account: Address, sequence: u64) -> SyncError {
		self.tracker().record_discarded();
		self.events
			.dispatch(&ClientEvent::StaleRefreshDiscarded { account, sequence })
			.await;
		SyncError::StaleRefreshDiscarded { account, sequence }
	}

	async fn read_snapshot(
		&self,
		account: Address,
		sequence: u64,
	) -> Result<AccountSnapshot, LedgerError> {
		let balance = self.gateway.get_balance(account).await?;
		let compliance_verified = self.gateway.get_compliance_status(account).await?;
		let owner = self.gateway.owner().await?;
		let compliance_admin = self.gateway.compliance_admin().await?;

		let count = self.gateway.get_transaction_count(account).await?;
		let mut transactions = Vec::new();
		for index in 0..count {
			transactions.push(self.gateway.get_transaction_details(account, index).await?);
		}

		Ok(AccountSnapshot {
			sequence,
			account,
			balance,
			compliance_verified,
			is_admin: same_identity(&account, &owner) || same_identity(&account, &compliance_admin),
			transactions,
			refreshed_at: Utc::now(),
		})
	}

	fn is_current_identity(&self, account: Address) -> bool {
		self.session
			.identity()
			.is_some_and(|identity| same_identity(&identity, &account))
	}

	pub fn snapshot(&self) -> Option<AccountSnapshot> {
		self.snapshot.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<AccountSnapshot>> {
		self.snapshot.subscribe()
	}

	/// Starts refreshing `account` every refresh interval, replacing any running timer.
	pub fn start_periodic(self: &Arc<Self>, account: Address) {
		let weak = Arc::downgrade(self);
		let task = PeriodicRefresh::spawn(
			account,
			self.refresh_interval,
			self.session.subscribe(),
			move || {
				let weak = weak.clone();
				async move {
					let Some(sync) = weak.upgrade() else {
						return false;
					};
					if let Err(e) = sync.refresh(account).await {
						debug!("Periodic refresh for {:?} did not apply: {}", account, e);
					}
					true
				}
			},
		);

		info!(
			"Refreshing {:?} every {}s",
			account,
			self.refresh_interval.as_secs()
		);
		*self.periodic.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
	}

	pub fn stop_periodic(&self) {
		let task = self
			.periodic
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(task) = task {
			debug!("Stopping periodic refresh for {:?}", task.account());
		}
	}

	pub fn is_periodic_running(&self) -> bool {
		self.periodic
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.is_some_and(|task| !task.is_finished())
	}

	/// Drops the snapshot and starts a fresh set of refresh statistics.
	pub fn clear(&self) {
		self.snapshot.send_replace(None);
		let mut tracker = self.tracker();
		tracker.log_summary();
		*tracker = RefreshTracker::new();
	}

	pub fn stats(&self) -> RefreshStats {
		self.tracker().get_stats()
	}
}

impl Drop for StateSynchronizer {
	fn drop(&mut self) {
		self.stop_periodic();
	}
}
