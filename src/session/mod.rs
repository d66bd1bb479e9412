//! Session management: who is connected and what they may do.
//!
//! A session starts when the wallet hands out an account and ends on an explicit
//! disconnect. The admin capability is resolved once at connect time by comparing the
//! identity with the ledger's owner and compliance admin, and is never set by callers.

/// Wallet collaborators behind a session
pub mod wallet;

pub use wallet::{LocalKeyWallet, NodeWallet, WalletError, WalletProvider};

use std::sync::Arc;

use ethers::types::Address;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

use crate::ledger::{LedgerError, LedgerGateway};
use crate::notification::{NotificationCenter, NotificationKind};

/// The connected identity and its derived capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
	pub address: Option<Address>,
	pub is_admin: bool,
	pub is_loading: bool,
}

impl Session {
	pub fn is_active(&self) -> bool {
		self.address.is_some()
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
	#[error("no wallet accounts available")]
	NoAccounts,

	#[error(transparent)]
	Wallet(#[from] WalletError),

	#[error(transparent)]
	Ledger(#[from] LedgerError),
}

/// Identity comparison for ledger addresses.
///
/// Addresses are parsed from hexadecimal, so letter case in their textual form carries
/// no meaning; comparing the decoded 20 bytes is the case-insensitive comparison.
pub fn same_identity(a: &Address, b: &Address) -> bool {
	a.as_bytes() == b.as_bytes()
}

pub struct SessionManager {
	wallet: Arc<dyn WalletProvider>,
	gateway: Arc<dyn LedgerGateway>,
	notifications: Arc<NotificationCenter>,
	state: watch::Sender<Session>,
}

impl SessionManager {
	pub fn new(
		wallet: Arc<dyn WalletProvider>,
		gateway: Arc<dyn LedgerGateway>,
		notifications: Arc<NotificationCenter>,
	) -> Self {
		let (state, _) = watch::channel(Session::default());
		Self {
			wallet,
			gateway,
			notifications,
			state,
		}
	}

	/// Opens a session for the wallet's first account.
	///
	/// On failure no session exists afterwards and an error notification is shown.
	pub async fn connect(&self) -> Result<Session, SessionError> {
		self.set_loading(true);

		match self.establish().await {
			Ok(session) => {
				info!(
					"Connected {:?} (admin: {})",
					session.address, session.is_admin
				);
				self.state.send_replace(session.clone());
				Ok(session)
			}
			Err(e) => {
				error!("Error connecting wallet: {}", e);
				self.state.send_replace(Session::default());
				let message = match e {
					SessionError::NoAccounts => "No wallet accounts available",
					_ => "Failed to connect wallet",
				};
				self.notifications.show(message, NotificationKind::Error);
				Err(e)
			}
		}
	}

	async fn establish(&self) -> Result<Session, SessionError> {
		let accounts = self.wallet.request_accounts().await?;
		let address = *accounts.first().ok_or(SessionError::NoAccounts)?;

		let (owner, compliance_admin) =
			futures::try_join!(self.gateway.owner(), self.gateway.compliance_admin())?;
		let is_admin =
			same_identity(&address, &owner) || same_identity(&address, &compliance_admin);

		Ok(Session {
			address: Some(address),
			is_admin,
			is_loading: false,
		})
	}

	pub fn disconnect(&self) {
		let previous = self.state.send_replace(Session::default());
		if let Some(address) = previous.address {
			info!("Disconnected {:?}", address);
		}
	}

	pub fn session(&self) -> Session {
		self.state.borrow().clone()
	}

	pub fn identity(&self) -> Option<Address> {
		self.state.borrow().address
	}

	pub fn is_admin(&self) -> bool {
		self.state.borrow().is_admin
	}

	pub fn is_loading(&self) -> bool {
		self.state.borrow().is_loading
	}

	pub fn set_loading(&self, loading: bool) {
		self.state.send_if_modified(|session| {
			let changed = session.is_loading != loading;
			session.is_loading = loading;
			changed
		});
	}

	/// Raises `is_loading` until the returned guard is dropped.
	pub fn loading(&self) -> LoadingGuard<'_> {
		self.set_loading(true);
		LoadingGuard { manager: self }
	}

	pub fn subscribe(&self) -> watch::Receiver<Session> {
		self.state.subscribe()
	}
}

pub struct LoadingGuard<'a> {
	manager: &'a SessionManager,
}

impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		self.manager.set_loading(false);
	}
}
