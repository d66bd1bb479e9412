//! Types for the ledger gateway boundary

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::proof::ProofArtifact;

/// A single entry of an account's transaction log as stored by the ledger.
///
/// Records are immutable once produced by the ledger and are kept in the ledger's
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
	/// The proof artifact that accompanied the operation.
	pub proof: ProofArtifact,
	/// The counterparty of the operation.
	pub recipient: Address,
	/// Amount in the smallest unit.
	pub amount: U256,
	/// Block time at which the ledger recorded the operation.
	pub timestamp: DateTime<Utc>,
	/// Whether the compliance gate admitted the operation.
	pub compliance_verified: bool,
}

/// Output of the compliance verifier's `generateComplianceProof` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAttestation {
	pub kyc_hash: H256,
	pub aml_verification: H256,
	pub risk_score: u64,
}

/// Handle for a submitted write that has not been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
	pub tx_hash: TxHash,
}

impl PendingOperation {
	pub fn new(tx_hash: TxHash) -> Self {
		Self { tx_hash }
	}
}

/// Final state of a submitted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
	/// The write was mined and executed successfully.
	Confirmed {
		tx_hash: TxHash,
		block_number: Option<u64>,
	},
	/// The write reverted, was dropped, or its status could not be obtained.
	Failed { tx_hash: TxHash, reason: String },
}

/// Uniform error for everything that goes wrong on the remote side.
///
/// The gateway does not interpret failures: transport errors, reverts and malformed
/// responses all end up here with the underlying message as `reason`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
	#[error("remote call failed: {reason}")]
	RemoteCallFailed { reason: String },
}

impl LedgerError {
	pub fn remote(reason: impl std::fmt::Display) -> Self {
		LedgerError::RemoteCallFailed {
			reason: reason.to_string(),
		}
	}
}
