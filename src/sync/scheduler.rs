//! The periodic refresh task and its scoped lifetime.

use std::future::Future;
use std::time::Duration;

use ethers::types::Address;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::session::Session;

/// Handle to a running periodic refresh for one identity.
///
/// The task stops when the handle is dropped, when the session's identity changes away
/// from `account`, or when `tick` returns `false`.
pub struct PeriodicRefresh {
	account: Address,
	handle: JoinHandle<()>,
}

impl PeriodicRefresh {
	/// Spawns the task; the first tick fires one `period` after the call.
	pub fn spawn<F, Fut>(
		account: Address,
		period: Duration,
		mut session: watch::Receiver<Session>,
		mut tick: F,
	) -> Self
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = bool> + Send + 'static,
	{
		let handle = tokio::spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let current = session.borrow().address;
						if current != Some(account) || !tick().await {
							break;
						}
					}
					changed = session.changed() => {
						if changed.is_err() || session.borrow_and_update().address != Some(account) {
							break;
						}
					}
				}
			}
			debug!("Periodic refresh for {:?} stopped", account);
		});

		Self { account, handle }
	}

	pub fn account(&self) -> Address {
		self.account
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl Drop for PeriodicRefresh {
	fn drop(&mut self) {
		self.handle.abort();
	}
}
