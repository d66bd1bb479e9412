//! Composition root for the compliance client.
//!
//! [`ComplianceClient`] wires the gateway, wallet, prover, session, synchronizer,
//! orchestrator and notification center together and ties the periodic refresh to the
//! session lifecycle: it starts on connect and is released on disconnect or drop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::events::{ClientEventHandler, EventDispatcher};
use crate::ledger::LedgerGateway;
use crate::notification::{DEFAULT_NOTIFICATION_TTL, NotificationCenter};
use crate::proof::{HashCommitmentProver, ProofGenerator};
use crate::session::{Session, SessionError, SessionManager, WalletProvider};
use crate::sync::{
	AccountSnapshot, DEFAULT_REFRESH_INTERVAL, RefreshStats, StateSynchronizer, SyncError,
};
use crate::transaction::{TokenConfig, TransactionOrchestrator};

pub struct ComplianceClient {
	gateway: Arc<dyn LedgerGateway>,
	session: Arc<SessionManager>,
	sync: Arc<StateSynchronizer>,
	orchestrator: TransactionOrchestrator,
	notifications: Arc<NotificationCenter>,
}

impl ComplianceClient {
	pub fn builder(
		gateway: Arc<dyn LedgerGateway>,
		wallet: Arc<dyn WalletProvider>,
	) -> ComplianceClientBuilder {
		ComplianceClientBuilder::new(gateway, wallet)
	}

	/// Opens a session, loads the first snapshot and starts the periodic refresh.
	///
	/// A failed first refresh does not fail the connection; it is reported like any other
	/// refresh failure and retried by the timer.
	pub async fn connect(&self) -> Result<Session, SessionError> {
		self.sync.stop_periodic();
		self.sync.clear();

		let session = self.session.connect().await?;
		let Some(account) = session.address else {
			return Ok(session);
		};

		{
			let _loading = self.session.loading();
			if let Err(e) = self.sync.refresh(account).await {
				warn!("Initial refresh for {:?} did not apply: {}", account, e);
			}
		}
		self.sync.start_periodic(account);
		Ok(self.session.session())
	}

	/// Ends the session, stops the periodic refresh and drops the snapshot.
	pub fn disconnect(&self) {
		self.sync.stop_periodic();
		self.session.disconnect();
		self.sync.clear();
		info!("Session closed");
	}

	/// Refreshes the current identity now. `None` without a session.
	pub async fn refresh(&self) -> Option<Result<AccountSnapshot, SyncError>> {
		let account = self.session.identity()?;
		Some(self.sync.refresh(account).await)
	}

	pub fn session(&self) -> Session {
		self.session.session()
	}

	pub fn subscribe_session(&self) -> watch::Receiver<Session> {
		self.session.subscribe()
	}

	pub fn snapshot(&self) -> Option<AccountSnapshot> {
		self.sync.snapshot()
	}

	pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<AccountSnapshot>> {
		self.sync.subscribe()
	}

	pub fn refresh_stats(&self) -> RefreshStats {
		self.sync.stats()
	}

	pub fn orchestrator(&self) -> &TransactionOrchestrator {
		&self.orchestrator
	}

	pub fn notifications(&self) -> &NotificationCenter {
		&self.notifications
	}

	pub fn gateway(&self) -> &dyn LedgerGateway {
		self.gateway.as_ref()
	}
}

impl Drop for ComplianceClient {
	fn drop(&mut self) {
		self.sync.stop_periodic();
	}
}

/// Builder for [`ComplianceClient`]
pub struct ComplianceClientBuilder {
	gateway: Arc<dyn LedgerGateway>,
	wallet: Arc<dyn WalletProvider>,
	proof_generator: Option<Arc<dyn ProofGenerator>>,
	events: EventDispatcher,
	refresh_interval: Duration,
	notification_ttl: Duration,
	token: TokenConfig,
}

impl ComplianceClientBuilder {
	pub fn new(gateway: Arc<dyn LedgerGateway>, wallet: Arc<dyn WalletProvider>) -> Self {
		Self {
			gateway,
			wallet,
			proof_generator: None,
			events: EventDispatcher::new(),
			refresh_interval: DEFAULT_REFRESH_INTERVAL,
			notification_ttl: DEFAULT_NOTIFICATION_TTL,
			token: TokenConfig::default(),
		}
	}

	/// Sets the proof generator; a [`HashCommitmentProver`] is used otherwise.
	pub fn with_proof_generator(mut self, proof_generator: Arc<dyn ProofGenerator>) -> Self {
		self.proof_generator = Some(proof_generator);
		self
	}

	pub fn with_event_handler(mut self, handler: Box<dyn ClientEventHandler>) -> Self {
		self.events.register_handler(handler);
		self
	}

	pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
		self.refresh_interval = refresh_interval;
		self
	}

	pub fn with_notification_ttl(mut self, notification_ttl: Duration) -> Self {
		self.notification_ttl = notification_ttl;
		self
	}

	pub fn with_token(mut self, token: TokenConfig) -> Self {
		self.token = token;
		self
	}

	pub fn build(self) -> ComplianceClient {
		let proof_generator = self
			.proof_generator
			.unwrap_or_else(|| Arc::new(HashCommitmentProver::new()));
		info!("Using {} for proof artifacts", proof_generator.name());

		let events = Arc::new(self.events);
		let notifications = Arc::new(NotificationCenter::new(self.notification_ttl));
		let session = Arc::new(SessionManager::new(
			self.wallet,
			self.gateway.clone(),
			notifications.clone(),
		));
		let sync = Arc::new(StateSynchronizer::new(
			self.gateway.clone(),
			session.clone(),
			notifications.clone(),
			events.clone(),
			self.refresh_interval,
		));
		let orchestrator = TransactionOrchestrator::new(
			self.gateway.clone(),
			proof_generator,
			session.clone(),
			sync.clone(),
			notifications.clone(),
			events,
			self.token,
		);

		ComplianceClient {
			gateway: self.gateway,
			session,
			sync,
			orchestrator,
			notifications,
		}
	}
}
