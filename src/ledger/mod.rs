//! Ledger integration module for the compliance-gated DeFi contracts.
//!
//! This module provides the gateway trait through which every other component talks to
//! the remote ledger, the ethers-backed implementation of it, and the value types that
//! cross that boundary. The gateway is a narrow typed surface: it performs no caching and
//! does not interpret remote failures.

/// Human-readable ABIs for the two ledger contracts
mod abi;
/// Ethers-backed gateway implementation
mod client;
/// Type definitions for ledger data structures
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::EthersLedgerGateway;
pub use types::*;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

use crate::proof::ProofArtifact;

/// Typed read/write boundary to the remote ledger.
///
/// Reads are eventually-consistent views of remote state. Writes carry the signing
/// identity as `from` and return a [`PendingOperation`] that is resolved with
/// [`LedgerGateway::await_confirmation`].
#[async_trait]
pub trait LedgerGateway: Send + Sync {
	async fn get_balance(&self, account: Address) -> Result<U256, LedgerError>;
	async fn get_compliance_status(&self, user: Address) -> Result<bool, LedgerError>;
	async fn owner(&self) -> Result<Address, LedgerError>;
	async fn compliance_admin(&self) -> Result<Address, LedgerError>;
	async fn get_transaction_count(&self, user: Address) -> Result<u64, LedgerError>;
	async fn get_transaction_details(
		&self,
		user: Address,
		index: u64,
	) -> Result<TransactionRecord, LedgerError>;
	async fn get_kyc_status(&self, user: Address) -> Result<bool, LedgerError>;
	async fn get_risk_score(&self, user: Address) -> Result<u64, LedgerError>;
	async fn defi_contract(&self) -> Result<Address, LedgerError>;
	async fn generate_compliance_proof(
		&self,
		user: Address,
	) -> Result<ComplianceAttestation, LedgerError>;

	async fn deposit(&self, from: Address, amount: U256) -> Result<PendingOperation, LedgerError>;
	async fn withdraw(
		&self,
		from: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError>;
	async fn private_transfer(
		&self,
		from: Address,
		recipient: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError>;
	async fn submit_compliance_proof(
		&self,
		from: Address,
		kyc_hash: H256,
		aml_verification: H256,
		risk_score: u64,
	) -> Result<PendingOperation, LedgerError>;
	async fn set_compliance_verifier(
		&self,
		from: Address,
		verifier: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError>;
	async fn set_compliance_admin(
		&self,
		from: Address,
		admin: Address,
	) -> Result<PendingOperation, LedgerError>;
	async fn set_min_compliance_score(
		&self,
		from: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError>;
	async fn verify_kyc(
		&self,
		from: Address,
		user: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError>;
	async fn set_risk_score(
		&self,
		from: Address,
		user: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError>;
	async fn submit_proof_to_defi(
		&self,
		from: Address,
		user: Address,
	) -> Result<PendingOperation, LedgerError>;
	async fn set_defi_contract(
		&self,
		from: Address,
		defi_contract: Address,
	) -> Result<PendingOperation, LedgerError>;

	/// Waits until the submitted write is mined and reports how it ended.
	async fn await_confirmation(&self, pending: &PendingOperation) -> Confirmation;
}
