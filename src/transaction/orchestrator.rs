//! Transaction orchestrator
//!
//! Runs every mutating operation through the same protocol: session and admin guard,
//! build (amount conversion and proof), submit, wait for confirmation, refresh, notify.
//! Outcomes are reported as notifications and returned as [`OperationOutcome`]; nothing
//! is retried.
//!
//! The orchestrator does not serialize concurrent operations. Callers are expected to
//! hold off new writes while the session reports `is_loading`.

use std::sync::Arc;

use ethers::types::{Address, H256, TxHash};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{Operation, OperationBuilder, OperationError, OperationKind, OperationOutcome};
use super::{OperationPhase, TokenConfig};
use crate::events::{ClientEvent, EventDispatcher};
use crate::ledger::{Confirmation, LedgerGateway};
use crate::notification::{NotificationCenter, NotificationKind};
use crate::proof::ProofGenerator;
use crate::session::SessionManager;
use crate::sync::{FETCH_FAILED_MESSAGE, StateSynchronizer};

/// Compliance state of an arbitrary user, as seen by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplianceProfile {
	pub user: Address,
	pub kyc_verified: bool,
	pub risk_score: u64,
	pub compliance_verified: bool,
}

pub struct TransactionOrchestrator {
	gateway: Arc<dyn LedgerGateway>,
	proof_generator: Arc<dyn ProofGenerator>,
	session: Arc<SessionManager>,
	sync: Arc<StateSynchronizer>,
	notifications: Arc<NotificationCenter>,
	events: Arc<EventDispatcher>,
	token: TokenConfig,
}

impl TransactionOrchestrator {
	pub fn new(
		gateway: Arc<dyn LedgerGateway>,
		proof_generator: Arc<dyn ProofGenerator>,
		session: Arc<SessionManager>,
		sync: Arc<StateSynchronizer>,
		notifications: Arc<NotificationCenter>,
		events: Arc<EventDispatcher>,
		token: TokenConfig,
	) -> Self {
		Self {
			gateway,
			proof_generator,
			session,
			sync,
			notifications,
			events,
			token,
		}
	}

	pub fn token(&self) -> &TokenConfig {
		&self.token
	}

	pub async fn deposit(&self, amount: &str) -> OperationOutcome {
		self.execute(Operation::Deposit {
			amount: amount.to_string(),
		})
		.await
	}

	pub async fn transfer(&self, recipient: Address, amount: &str) -> OperationOutcome {
		self.execute(Operation::Transfer {
			recipient,
			amount: amount.to_string(),
		})
		.await
	}

	pub async fn withdraw(&self, amount: &str) -> OperationOutcome {
		self.execute(Operation::Withdraw {
			amount: amount.to_string(),
		})
		.await
	}

	pub async fn verify_kyc(&self, user: Address, status: bool) -> OperationOutcome {
		self.execute(Operation::VerifyKyc { user, status }).await
	}

	pub async fn set_risk_score(&self, user: Address, score: u64) -> OperationOutcome {
		self.execute(Operation::SetRiskScore { user, score }).await
	}

	pub async fn set_compliance_verifier(
		&self,
		verifier: Address,
		status: bool,
	) -> OperationOutcome {
		self.execute(Operation::SetComplianceVerifier { verifier, status })
			.await
	}

	pub async fn submit_compliance_proof(&self, user: Address) -> OperationOutcome {
		self.execute(Operation::SubmitComplianceProof { user }).await
	}

	pub async fn submit_compliance_attestation(
		&self,
		kyc_hash: H256,
		aml_verification: H256,
		risk_score: u64,
	) -> OperationOutcome {
		self.execute(Operation::SubmitComplianceAttestation {
			kyc_hash,
			aml_verification,
			risk_score,
		})
		.await
	}

	pub async fn set_compliance_admin(&self, admin: Address) -> OperationOutcome {
		self.execute(Operation::SetComplianceAdmin { admin }).await
	}

	pub async fn set_min_compliance_score(&self, score: u64) -> OperationOutcome {
		self.execute(Operation::SetMinComplianceScore { score })
			.await
	}

	pub async fn set_defi_contract(&self, defi_contract: Address) -> OperationOutcome {
		self.execute(Operation::SetDefiContract { defi_contract })
			.await
	}

	/// Runs one operation to a terminal phase.
	pub async fn execute(&self, operation: Operation) -> OperationOutcome {
		let kind = operation.kind();

		let Some(sender) = self.session.identity() else {
			debug!("Ignoring {}: no active session", kind);
			return OperationOutcome::Rejected;
		};
		if kind.requires_admin() && !self.session.is_admin() {
			debug!("Ignoring {}: {:?} is not an admin", kind, sender);
			return OperationOutcome::Rejected;
		}

		let _loading = self.session.loading();
		let mut phase = OperationPhase::Idle;
		self.enter_phase(kind, &mut phase, OperationPhase::Building, None)
			.await;

		let prepared = match OperationBuilder::new(operation)
			.with_sender(sender)
			.with_proof_generator(self.proof_generator.as_ref())
			.with_token(self.token.clone())
			.build()
			.await
		{
			Ok(prepared) => prepared,
			Err(e) => return self.fail(kind, &mut phase, None, e).await,
		};

		let pending = match prepared.submit(self.gateway.as_ref()).await {
			Ok(pending) => pending,
			Err(e) => return self.fail(kind, &mut phase, None, e.into()).await,
		};
		info!("Submitted {} as {:?}", kind, pending.tx_hash);
		self.enter_phase(
			kind,
			&mut phase,
			OperationPhase::Submitted,
			Some(pending.tx_hash),
		)
		.await;

		match self.gateway.await_confirmation(&pending).await {
			Confirmation::Confirmed {
				tx_hash,
				block_number,
			} => {
				info!(
					"{} confirmed: {:?} in block {:?}",
					kind, tx_hash, block_number
				);
				self.enter_phase(kind, &mut phase, OperationPhase::Confirmed, Some(tx_hash))
					.await;

				let refreshed = match self.sync.refresh(sender).await {
					Ok(_) => true,
					Err(e) => {
						warn!("Refresh after {} did not apply: {}", kind, e);
						false
					}
				};
				self.notifications
					.show(prepared.success_message, NotificationKind::Success);
				OperationOutcome::Confirmed { tx_hash, refreshed }
			}
			Confirmation::Failed { tx_hash, reason } => {
				self.fail(
					kind,
					&mut phase,
					Some(tx_hash),
					OperationError::Reverted { tx_hash, reason },
				)
				.await
			}
		}
	}

	async fn enter_phase(
		&self,
		kind: OperationKind,
		current: &mut OperationPhase,
		phase: OperationPhase,
		tx_hash: Option<TxHash>,
	) {
		debug_assert!(
			current.can_advance_to(phase),
			"{kind}: {current:?} -> {phase:?}"
		);
		*current = phase;
		self.events
			.dispatch(&ClientEvent::OperationPhaseChanged {
				operation: kind,
				phase,
				tx_hash,
			})
			.await;
	}

	async fn fail(
		&self,
		kind: OperationKind,
		phase: &mut OperationPhase,
		tx_hash: Option<TxHash>,
		error: OperationError,
	) -> OperationOutcome {
		error!("Error during {}: {}", kind, error);
		self.enter_phase(kind, phase, OperationPhase::Failed, tx_hash)
			.await;
		self.notifications.show(
			format!("{}: {}", kind.failure_message(), error),
			NotificationKind::Error,
		);
		OperationOutcome::Failed { error }
	}

	/// Reads the compliance state of `user`. Admin only; `None` when the guard rejects.
	pub async fn inspect_user(
		&self,
		user: Address,
	) -> Option<Result<ComplianceProfile, OperationError>> {
		if self.session.identity().is_none() || !self.session.is_admin() {
			debug!("Ignoring inspection of {:?}: not an admin session", user);
			return None;
		}

		let result = futures::try_join!(
			self.gateway.get_kyc_status(user),
			self.gateway.get_risk_score(user),
			self.gateway.get_compliance_status(user),
		);

		Some(match result {
			Ok((kyc_verified, risk_score, compliance_verified)) => Ok(ComplianceProfile {
				user,
				kyc_verified,
				risk_score,
				compliance_verified,
			}),
			Err(e) => {
				error!("Error inspecting {:?}: {}", user, e);
				self.notifications.show(
					format!("{}: {}", FETCH_FAILED_MESSAGE, e),
					NotificationKind::Error,
				);
				Err(e.into())
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use ethers::types::U256;

	use super::*;
	use crate::events::testing::RecordingHandler;
	use crate::ledger::testing::InMemoryLedger;
	use crate::proof::HashCommitmentProver;
	use crate::session::LocalKeyWallet;
	use crate::sync::DEFAULT_REFRESH_INTERVAL;
	use crate::utils::{format_token_amount, parse_token_amount};

	struct Harness {
		ledger: Arc<InMemoryLedger>,
		session: Arc<SessionManager>,
		sync: Arc<StateSynchronizer>,
		notifications: Arc<NotificationCenter>,
		recorder: RecordingHandler,
		orchestrator: TransactionOrchestrator,
	}

	fn user() -> Address {
		Address::repeat_byte(0x11)
	}

	fn eth(amount: &str) -> U256 {
		parse_token_amount(amount, 18).expect("amount")
	}

	fn harness_for(ledger: Arc<InMemoryLedger>, identity: Address) -> Harness {
		let notifications = Arc::new(NotificationCenter::default());
		let session = Arc::new(SessionManager::new(
			Arc::new(LocalKeyWallet::new(identity)),
			ledger.clone(),
			notifications.clone(),
		));
		let recorder = RecordingHandler::default();
		let mut events = EventDispatcher::new();
		events.register_handler(Box::new(recorder.clone()));
		let events = Arc::new(events);

		let sync = Arc::new(StateSynchronizer::new(
			ledger.clone(),
			session.clone(),
			notifications.clone(),
			events.clone(),
			DEFAULT_REFRESH_INTERVAL,
		));
		let orchestrator = TransactionOrchestrator::new(
			ledger.clone(),
			Arc::new(HashCommitmentProver::new()),
			session.clone(),
			sync.clone(),
			notifications.clone(),
			events,
			TokenConfig::default(),
		);

		Harness {
			ledger,
			session,
			sync,
			notifications,
			recorder,
			orchestrator,
		}
	}

	async fn connected(identity: Address) -> Harness {
		let h = harness_for(Arc::new(InMemoryLedger::new()), identity);
		h.session.connect().await.expect("connect");
		h.sync.refresh(identity).await.expect("initial refresh");
		h.ledger.clear_calls();
		h
	}

	#[tokio::test]
	async fn deposit_refreshes_and_reports_the_exact_amount() {
		let h = connected(user()).await;
		h.ledger.set_balance(user(), eth("2"));
		h.sync.refresh(user()).await.expect("refresh");

		let outcome = h.orchestrator.deposit("1.5").await;

		assert!(outcome.is_confirmed());
		let snapshot = h.sync.snapshot().expect("snapshot");
		assert_eq!(snapshot.balance, eth("3.5"));
		assert_eq!(snapshot.balance - eth("2"), eth("1.5"));
		assert_eq!(format_token_amount(eth("1.5"), 18), "1.5");

		let notification = h.notifications.current().expect("notification");
		assert_eq!(notification.kind, NotificationKind::Success);
		assert_eq!(notification.message, "Successfully deposited 1.5 ETH");
		assert_eq!(
			h.recorder.phases(),
			vec![
				OperationPhase::Building,
				OperationPhase::Submitted,
				OperationPhase::Confirmed
			]
		);
		assert!(!h.session.is_loading());
	}

	#[tokio::test]
	async fn withdraw_over_balance_is_rejected_remotely() {
		let h = connected(user()).await;
		h.ledger.set_balance(user(), eth("1"));
		let before = h.sync.refresh(user()).await.expect("refresh");
		h.ledger.clear_calls();

		let outcome = h.orchestrator.withdraw("5").await;

		assert!(matches!(
			outcome,
			OperationOutcome::Failed {
				error: OperationError::Remote(_)
			}
		));
		assert_eq!(h.ledger.calls(), vec!["withdraw"]);
		assert_eq!(h.sync.snapshot(), Some(before));

		let notification = h.notifications.current().expect("notification");
		assert_eq!(notification.kind, NotificationKind::Error);
		assert!(notification.message.starts_with("Failed to withdraw funds: "));
		assert!(notification.message.contains("Insufficient balance"));
		assert_eq!(
			h.recorder.phases(),
			vec![OperationPhase::Building, OperationPhase::Failed]
		);
	}

	#[tokio::test]
	async fn transfer_from_non_compliant_account_changes_nothing() {
		let h = connected(user()).await;
		h.ledger.set_balance(user(), eth("10"));
		h.sync.refresh(user()).await.expect("refresh");

		let outcome = h
			.orchestrator
			.transfer(Address::repeat_byte(0x22), "1")
			.await;

		assert!(matches!(outcome, OperationOutcome::Failed { .. }));
		let snapshot = h.sync.snapshot().expect("snapshot");
		assert!(!snapshot.compliance_verified);
		assert!(snapshot.transactions.is_empty());
		assert_eq!(snapshot.balance, eth("10"));

		let notification = h.notifications.current().expect("notification");
		assert_eq!(notification.kind, NotificationKind::Error);
		assert!(notification.message.starts_with("Failed to transfer funds: "));
	}

	#[tokio::test]
	async fn compliant_transfer_appends_a_record() {
		let h = connected(user()).await;
		let recipient = Address::repeat_byte(0x22);
		h.ledger.set_balance(user(), eth("10"));
		h.ledger.set_compliant(user(), true);

		let outcome = h.orchestrator.transfer(recipient, "2.25").await;

		assert!(matches!(
			outcome,
			OperationOutcome::Confirmed {
				refreshed: true,
				..
			}
		));
		let snapshot = h.sync.snapshot().expect("snapshot");
		assert_eq!(snapshot.balance, eth("7.75"));
		assert_eq!(snapshot.transactions.len(), 1);
		assert_eq!(snapshot.transactions[0].recipient, recipient);
		assert_eq!(snapshot.transactions[0].amount, eth("2.25"));
	}

	#[tokio::test]
	async fn admin_operations_without_capability_do_nothing() {
		let h = connected(user()).await;

		let outcome = h
			.orchestrator
			.verify_kyc(Address::repeat_byte(0x22), true)
			.await;

		assert_eq!(outcome, OperationOutcome::Rejected);
		assert!(h.ledger.calls().is_empty());
		assert!(h.notifications.current().is_none());
		assert!(h.recorder.phases().is_empty());
		assert!(h.orchestrator.inspect_user(user()).await.is_none());
	}

	#[tokio::test]
	async fn operations_without_a_session_do_nothing() {
		let h = harness_for(Arc::new(InMemoryLedger::new()), user());

		assert_eq!(h.orchestrator.deposit("1").await, OperationOutcome::Rejected);
		assert!(h.ledger.calls().is_empty());
		assert!(h.notifications.current().is_none());
	}

	#[tokio::test]
	async fn admin_can_verify_kyc_and_push_compliance() {
		let ledger = Arc::new(InMemoryLedger::new());
		let h = harness_for(ledger.clone(), ledger.owner_address());
		h.session.connect().await.expect("connect");
		let target = Address::repeat_byte(0x33);

		assert!(h.orchestrator.verify_kyc(target, true).await.is_confirmed());
		assert!(h.ledger.kyc_of(target));
		assert!(
			h.orchestrator
				.submit_compliance_proof(target)
				.await
				.is_confirmed()
		);

		let profile = h
			.orchestrator
			.inspect_user(target)
			.await
			.expect("admin session")
			.expect("profile");
		assert!(profile.kyc_verified);
		assert!(profile.compliance_verified);
		assert_eq!(h.ledger.call_count("get_balance"), 2);
		assert!(h.notifications.current().expect("notification").message.starts_with(
			"Successfully submitted compliance proof for 0x"
		));
	}

	#[tokio::test]
	async fn reverted_receipt_fails_without_refresh() {
		let h = connected(user()).await;
		h.ledger.revert_next_write();

		let outcome = h.orchestrator.deposit("1").await;

		assert!(matches!(
			outcome,
			OperationOutcome::Failed {
				error: OperationError::Reverted { .. }
			}
		));
		assert_eq!(h.ledger.calls(), vec!["deposit", "await_confirmation"]);
		assert_eq!(
			h.recorder.phases(),
			vec![
				OperationPhase::Building,
				OperationPhase::Submitted,
				OperationPhase::Failed
			]
		);
	}

	#[tokio::test]
	async fn unparsable_amount_never_reaches_the_ledger() {
		let h = connected(user()).await;

		let outcome = h.orchestrator.deposit("one").await;

		assert!(matches!(
			outcome,
			OperationOutcome::Failed {
				error: OperationError::InvalidAmount(_)
			}
		));
		assert!(h.ledger.calls().is_empty());
		assert!(
			h.notifications
				.current()
				.expect("notification")
				.message
				.starts_with("Failed to deposit funds: ")
		);
	}
}
