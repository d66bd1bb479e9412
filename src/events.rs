//! Event system for the compliance client.
//!
//! Components emit [`ClientEvent`]s when the local view changes or an operation moves to
//! a new phase. Handlers registered on the [`EventDispatcher`] receive every event, which
//! keeps logging, metrics or UI bindings out of the synchronizer and orchestrator.

use ethers::types::{Address, TxHash};

use crate::sync::AccountSnapshot;
use crate::transaction::{OperationKind, OperationPhase};

/// Events emitted by the synchronizer and the orchestrator
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum ClientEvent {
	/// A refresh completed and replaced the snapshot
	SnapshotReplaced {
		sequence: u64,
		snapshot: AccountSnapshot,
	},
	/// A refresh could not read the full state; the previous snapshot was kept
	RefreshFailed { account: Address, error: String },
	/// A refresh finished after a newer one, or after the session moved on
	StaleRefreshDiscarded { account: Address, sequence: u64 },
	/// An operation entered a new lifecycle phase
	OperationPhaseChanged {
		operation: OperationKind,
		phase: OperationPhase,
		tx_hash: Option<TxHash>,
	},
}

/// Trait for handling client events.
#[async_trait::async_trait]
pub trait ClientEventHandler: Send + Sync {
	/// Handle a client event.
	async fn handle(&self, event: &ClientEvent);

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that fans events out to every registered handler.
///
/// Handlers are registered while the client is being assembled; the dispatcher is
/// shared read-only afterwards.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn ClientEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new event handler. Handlers are called in registration order.
	pub fn register_handler(&mut self, handler: Box<dyn ClientEventHandler>) {
		self.handlers.push(handler);
	}

	pub async fn dispatch(&self, event: &ClientEvent) {
		for handler in &self.handlers {
			handler.handle(event).await;
		}
	}
}

/// Default handler that writes every event to the log.
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl ClientEventHandler for LoggingEventHandler {
	async fn handle(&self, event: &ClientEvent) {
		match event {
			ClientEvent::SnapshotReplaced { sequence, snapshot } => {
				tracing::info!(
					"Snapshot #{} for {:?}: balance {} wei, compliant {}, {} transactions",
					sequence,
					snapshot.account,
					snapshot.balance,
					snapshot.compliance_verified,
					snapshot.transactions.len()
				);
			}
			ClientEvent::RefreshFailed { account, error } => {
				tracing::error!("Refresh for {:?} failed: {}", account, error);
			}
			ClientEvent::StaleRefreshDiscarded { account, sequence } => {
				tracing::debug!("Discarded stale refresh #{} for {:?}", sequence, account);
			}
			ClientEvent::OperationPhaseChanged {
				operation,
				phase,
				tx_hash,
			} => {
				tracing::debug!("{} -> {:?} ({:?})", operation, phase, tx_hash);
			}
		}
	}

	fn name(&self) -> &'static str {
		"LoggingEventHandler"
	}
}
