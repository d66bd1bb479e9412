//! Operation types: what a caller asks for, and how an attempt ends.

use std::fmt;

use ethers::types::{Address, H256, TxHash};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::proof::ProofError;
use crate::utils::AmountError;

/// A mutating request as issued by a caller. Amounts are decimal strings in display
/// units and are only converted when the operation is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	Deposit {
		amount: String,
	},
	Transfer {
		recipient: Address,
		amount: String,
	},
	Withdraw {
		amount: String,
	},
	VerifyKyc {
		user: Address,
		status: bool,
	},
	SetRiskScore {
		user: Address,
		score: u64,
	},
	SetComplianceVerifier {
		verifier: Address,
		status: bool,
	},
	/// Pushes the verifier's view of `user` to the DeFi ledger.
	SubmitComplianceProof {
		user: Address,
	},
	/// Submits an attestation directly to the DeFi ledger as a compliance verifier.
	SubmitComplianceAttestation {
		kyc_hash: H256,
		aml_verification: H256,
		risk_score: u64,
	},
	SetComplianceAdmin {
		admin: Address,
	},
	SetMinComplianceScore {
		score: u64,
	},
	SetDefiContract {
		defi_contract: Address,
	},
}

impl Operation {
	pub fn kind(&self) -> OperationKind {
		match self {
			Operation::Deposit { .. } => OperationKind::Deposit,
			Operation::Transfer { .. } => OperationKind::Transfer,
			Operation::Withdraw { .. } => OperationKind::Withdraw,
			Operation::VerifyKyc { .. } => OperationKind::VerifyKyc,
			Operation::SetRiskScore { .. } => OperationKind::SetRiskScore,
			Operation::SetComplianceVerifier { .. } => OperationKind::SetComplianceVerifier,
			Operation::SubmitComplianceProof { .. } => OperationKind::SubmitComplianceProof,
			Operation::SubmitComplianceAttestation { .. } => {
				OperationKind::SubmitComplianceAttestation
			}
			Operation::SetComplianceAdmin { .. } => OperationKind::SetComplianceAdmin,
			Operation::SetMinComplianceScore { .. } => OperationKind::SetMinComplianceScore,
			Operation::SetDefiContract { .. } => OperationKind::SetDefiContract,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
	Deposit,
	Transfer,
	Withdraw,
	VerifyKyc,
	SetRiskScore,
	SetComplianceVerifier,
	SubmitComplianceProof,
	SubmitComplianceAttestation,
	SetComplianceAdmin,
	SetMinComplianceScore,
	SetDefiContract,
}

impl OperationKind {
	/// Operations gated on the session's admin capability.
	///
	/// Submitting an attestation is restricted by the ledger to compliance verifiers,
	/// which the client cannot tell apart, so it is left to the ledger to decide.
	pub fn requires_admin(&self) -> bool {
		!matches!(
			self,
			OperationKind::Deposit
				| OperationKind::Transfer
				| OperationKind::Withdraw
				| OperationKind::SubmitComplianceAttestation
		)
	}

	/// First half of the error notification for a failed attempt.
	pub fn failure_message(&self) -> &'static str {
		match self {
			OperationKind::Deposit => "Failed to deposit funds",
			OperationKind::Transfer => "Failed to transfer funds",
			OperationKind::Withdraw => "Failed to withdraw funds",
			OperationKind::VerifyKyc => "Failed to update KYC status",
			OperationKind::SetRiskScore => "Failed to set risk score",
			OperationKind::SetComplianceVerifier => "Failed to update compliance verifier",
			OperationKind::SubmitComplianceProof => "Failed to submit compliance proof",
			OperationKind::SubmitComplianceAttestation => {
				"Failed to submit compliance attestation"
			}
			OperationKind::SetComplianceAdmin => "Failed to set compliance admin",
			OperationKind::SetMinComplianceScore => "Failed to set minimum compliance score",
			OperationKind::SetDefiContract => "Failed to set DeFi contract",
		}
	}
}

impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			OperationKind::Deposit => "deposit",
			OperationKind::Transfer => "transfer",
			OperationKind::Withdraw => "withdraw",
			OperationKind::VerifyKyc => "verify_kyc",
			OperationKind::SetRiskScore => "set_risk_score",
			OperationKind::SetComplianceVerifier => "set_compliance_verifier",
			OperationKind::SubmitComplianceProof => "submit_compliance_proof",
			OperationKind::SubmitComplianceAttestation => "submit_compliance_attestation",
			OperationKind::SetComplianceAdmin => "set_compliance_admin",
			OperationKind::SetMinComplianceScore => "set_min_compliance_score",
			OperationKind::SetDefiContract => "set_defi_contract",
		})
	}
}

/// Lifecycle of one operation attempt: `Idle -> Building -> Submitted -> Confirmed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationPhase {
	Idle,
	/// Converting the amount and generating the proof artifact
	Building,
	Submitted,
	Confirmed,
	Failed,
}

impl OperationPhase {
	/// Whether `next` may follow `self`.
	pub fn can_advance_to(&self, next: OperationPhase) -> bool {
		matches!(
			(self, next),
			(OperationPhase::Idle, OperationPhase::Building)
				| (OperationPhase::Building, OperationPhase::Submitted)
				| (OperationPhase::Building, OperationPhase::Failed)
				| (OperationPhase::Submitted, OperationPhase::Confirmed)
				| (OperationPhase::Submitted, OperationPhase::Failed)
		)
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
	#[error(transparent)]
	InvalidAmount(#[from] AmountError),

	#[error(transparent)]
	Proof(#[from] ProofError),

	#[error(transparent)]
	Remote(#[from] LedgerError),

	#[error("transaction {tx_hash:?} failed: {reason}")]
	Reverted { tx_hash: TxHash, reason: String },

	#[error("operation is missing its {0}")]
	Incomplete(&'static str),
}

/// How an operation attempt ended, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
	/// No active session, or an admin operation without the admin capability. Nothing
	/// was sent and nothing was shown.
	Rejected,
	Confirmed {
		tx_hash: TxHash,
		/// Whether the follow-up refresh replaced the snapshot.
		refreshed: bool,
	},
	Failed {
		error: OperationError,
	},
}

impl OperationOutcome {
	pub fn is_confirmed(&self) -> bool {
		matches!(self, OperationOutcome::Confirmed { .. })
	}
}
