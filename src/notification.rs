//! Single-slot notification center with a bounded visibility window.
//!
//! There is never more than one notification: `show` replaces the current one together
//! with its expiry timer. Consumers either poll [`NotificationCenter::current`] or watch
//! the slot through [`NotificationCenter::subscribe`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long a notification stays visible unless configured otherwise.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
	Success,
	Error,
}

impl fmt::Display for NotificationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NotificationKind::Success => f.write_str("success"),
			NotificationKind::Error => f.write_str("error"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	/// Monotonic id, used to tell a replaced notification's timer apart.
	pub id: u64,
	pub message: String,
	pub kind: NotificationKind,
	pub expires_at: Instant,
}

pub struct NotificationCenter {
	ttl: Duration,
	next_id: AtomicU64,
	slot: Arc<watch::Sender<Option<Notification>>>,
	expiry_task: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationCenter {
	pub fn new(ttl: Duration) -> Self {
		let (slot, _) = watch::channel(None);
		Self {
			ttl,
			next_id: AtomicU64::new(1),
			slot: Arc::new(slot),
			expiry_task: Mutex::new(None),
		}
	}

	/// Replaces the current notification and restarts the expiry timer.
	pub fn show(&self, message: impl Into<String>, kind: NotificationKind) {
		let message = message.into().replace(['\r', '\n'], " ");
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let expires_at = Instant::now() + self.ttl;

		match kind {
			NotificationKind::Success => info!("Notification: {}", message),
			NotificationKind::Error => warn!("Notification: {}", message),
		}

		self.slot.send_replace(Some(Notification {
			id,
			message,
			kind,
			expires_at,
		}));

		let mut expiry_task = self
			.expiry_task
			.lock()
			.unwrap_or_else(PoisonError::into_inner);
		if let Some(previous) = expiry_task.take() {
			previous.abort();
		}

		// Without a runtime the slot is still expired lazily by `current`.
		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			let slot = Arc::clone(&self.slot);
			*expiry_task = Some(handle.spawn(async move {
				tokio::time::sleep_until(expires_at).await;
				slot.send_if_modified(|current| match current {
					Some(notification) if notification.id == id => {
						debug!("Notification {} expired", id);
						*current = None;
						true
					}
					_ => false,
				});
			}));
		}
	}

	/// The visible notification, if any.
	pub fn current(&self) -> Option<Notification> {
		let now = Instant::now();
		self.slot
			.borrow()
			.as_ref()
			.filter(|notification| now < notification.expires_at)
			.cloned()
	}

	pub fn clear(&self) {
		if let Some(task) = self
			.expiry_task
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			task.abort();
		}
		self.slot.send_replace(None);
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
		self.slot.subscribe()
	}
}

impl Default for NotificationCenter {
	fn default() -> Self {
		Self::new(DEFAULT_NOTIFICATION_TTL)
	}
}

impl Drop for NotificationCenter {
	fn drop(&mut self) {
		if let Some(task) = self
			.expiry_task
			.get_mut()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			task.abort();
		}
	}
}
