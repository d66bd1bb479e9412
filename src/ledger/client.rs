//! Ethers-backed implementation of the ledger gateway.
//!
//! Reads go through `eth_call` against the two contract instances; writes are sent
//! through the configured middleware, which is the signer/transport collaborator (a node
//! managed account or a local key). Confirmation waits for the receipt with a bounded
//! timeout and translates the receipt status.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::abi::{Detokenize, Tokenize};
use ethers::contract::Contract;
use ethers::providers::{Middleware, PendingTransaction};
use ethers::types::{Address, H256, U64, U256};
use tracing::{debug, error, info, warn};

use super::{
	ComplianceAttestation, Confirmation, LedgerError, LedgerGateway, PendingOperation,
	TransactionRecord, abi,
};
use crate::proof::ProofArtifact;

/// Gateway over the `PrivacyPreservingDeFi` and `ComplianceVerifier` contracts.
pub struct EthersLedgerGateway<M> {
	client: Arc<M>,
	defi: Contract<M>,
	compliance: Contract<M>,
	confirmations: usize,
	confirmation_timeout: Duration,
}

impl<M: Middleware + 'static> EthersLedgerGateway<M> {
	/// Create a gateway bound to the two contract deployments.
	///
	/// # Arguments
	/// * `client` - Middleware used for reads and for signing/sending writes.
	/// * `defi_address` - Address of the privacy-preserving DeFi ledger contract.
	/// * `compliance_address` - Address of the compliance verifier contract.
	pub fn new(
		client: Arc<M>,
		defi_address: Address,
		compliance_address: Address,
	) -> Result<Self, LedgerError> {
		let defi = Contract::new(defi_address, abi::defi_abi()?, client.clone());
		let compliance = Contract::new(compliance_address, abi::compliance_abi()?, client.clone());

		Ok(Self {
			client,
			defi,
			compliance,
			confirmations: 1,
			confirmation_timeout: Duration::from_secs(120),
		})
	}

	/// Sets how many confirmations a write needs and how long to wait for them.
	pub fn with_confirmations(mut self, confirmations: usize, timeout: Duration) -> Self {
		self.confirmations = confirmations.max(1);
		self.confirmation_timeout = timeout;
		self
	}

	async fn read<T, D>(
		&self,
		contract: &Contract<M>,
		function: &str,
		args: T,
		from: Option<Address>,
	) -> Result<D, LedgerError>
	where
		T: Tokenize + Send,
		D: Detokenize + Send,
	{
		let mut call = contract
			.method::<T, D>(function, args)
			.map_err(LedgerError::remote)?;
		if let Some(from) = from {
			call = call.from(from);
		}

		call.call().await.map_err(|e| {
			error!("Read {} failed: {}", function, e);
			LedgerError::remote(e)
		})
	}

	async fn write<T>(
		&self,
		contract: &Contract<M>,
		function: &str,
		args: T,
		from: Address,
		value: Option<U256>,
	) -> Result<PendingOperation, LedgerError>
	where
		T: Tokenize + Send,
	{
		let mut call = contract
			.method::<T, ()>(function, args)
			.map_err(LedgerError::remote)?
			.from(from);
		if let Some(value) = value {
			call = call.value(value);
		}

		let pending = call.send().await.map_err(|e| {
			error!("Submitting {} failed: {}", function, e);
			LedgerError::remote(e)
		})?;
		let tx_hash = pending.tx_hash();

		info!("Submitted {} from {:?}: {:?}", function, from, tx_hash);
		Ok(PendingOperation::new(tx_hash))
	}
}

fn to_u64(value: U256, field: &str) -> Result<u64, LedgerError> {
	if value > U256::from(u64::MAX) {
		return Err(LedgerError::remote(format!("{field} out of range: {value}")));
	}
	Ok(value.as_u64())
}

fn to_timestamp(value: U256) -> Result<DateTime<Utc>, LedgerError> {
	let secs = i64::try_from(to_u64(value, "timestamp")?)
		.map_err(|_| LedgerError::remote(format!("timestamp out of range: {value}")))?;
	DateTime::<Utc>::from_timestamp(secs, 0)
		.ok_or_else(|| LedgerError::remote(format!("timestamp out of range: {value}")))
}

#[async_trait]
impl<M: Middleware + 'static> LedgerGateway for EthersLedgerGateway<M> {
	async fn get_balance(&self, account: Address) -> Result<U256, LedgerError> {
		// `getBalance` reports the balance of msg.sender.
		self.read(&self.defi, "getBalance", (), Some(account)).await
	}

	async fn get_compliance_status(&self, user: Address) -> Result<bool, LedgerError> {
		self.read(&self.defi, "getUserComplianceStatus", user, None)
			.await
	}

	async fn owner(&self) -> Result<Address, LedgerError> {
		self.read(&self.defi, "owner", (), None).await
	}

	async fn compliance_admin(&self) -> Result<Address, LedgerError> {
		self.read(&self.defi, "complianceAdmin", (), None).await
	}

	async fn get_transaction_count(&self, user: Address) -> Result<u64, LedgerError> {
		let count: U256 = self
			.read(&self.defi, "getTransactionCount", user, None)
			.await?;
		to_u64(count, "transaction count")
	}

	async fn get_transaction_details(
		&self,
		user: Address,
		index: u64,
	) -> Result<TransactionRecord, LedgerError> {
		let (proof, recipient, amount, timestamp, compliance_verified): (
			H256,
			Address,
			U256,
			U256,
			bool,
		) = self
			.read(
				&self.defi,
				"getTransactionDetails",
				(user, U256::from(index)),
				None,
			)
			.await?;

		Ok(TransactionRecord {
			proof: ProofArtifact::from(proof),
			recipient,
			amount,
			timestamp: to_timestamp(timestamp)?,
			compliance_verified,
		})
	}

	async fn get_kyc_status(&self, user: Address) -> Result<bool, LedgerError> {
		self.read(&self.compliance, "getKYCStatus", user, None).await
	}

	async fn get_risk_score(&self, user: Address) -> Result<u64, LedgerError> {
		let score: U256 = self
			.read(&self.compliance, "getRiskScore", user, None)
			.await?;
		to_u64(score, "risk score")
	}

	async fn defi_contract(&self) -> Result<Address, LedgerError> {
		self.read(&self.compliance, "defiContract", (), None).await
	}

	async fn generate_compliance_proof(
		&self,
		user: Address,
	) -> Result<ComplianceAttestation, LedgerError> {
		let (kyc_hash, aml_verification, risk_score): (H256, H256, U256) = self
			.read(&self.compliance, "generateComplianceProof", user, None)
			.await?;

		Ok(ComplianceAttestation {
			kyc_hash,
			aml_verification,
			risk_score: to_u64(risk_score, "risk score")?,
		})
	}

	async fn deposit(&self, from: Address, amount: U256) -> Result<PendingOperation, LedgerError> {
		self.write(&self.defi, "deposit", (), from, Some(amount))
			.await
	}

	async fn withdraw(
		&self,
		from: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.defi,
			"withdraw",
			(amount, proof.as_h256()),
			from,
			None,
		)
		.await
	}

	async fn private_transfer(
		&self,
		from: Address,
		recipient: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.defi,
			"privateTransfer",
			(recipient, amount, proof.as_h256()),
			from,
			None,
		)
		.await
	}

	async fn submit_compliance_proof(
		&self,
		from: Address,
		kyc_hash: H256,
		aml_verification: H256,
		risk_score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.defi,
			"submitComplianceProof",
			(kyc_hash, aml_verification, U256::from(risk_score)),
			from,
			None,
		)
		.await
	}

	async fn set_compliance_verifier(
		&self,
		from: Address,
		verifier: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.defi,
			"setComplianceVerifier",
			(verifier, status),
			from,
			None,
		)
		.await
	}

	async fn set_compliance_admin(
		&self,
		from: Address,
		admin: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.write(&self.defi, "setComplianceAdmin", admin, from, None)
			.await
	}

	async fn set_min_compliance_score(
		&self,
		from: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.defi,
			"setMinComplianceScore",
			U256::from(score),
			from,
			None,
		)
		.await
	}

	async fn verify_kyc(
		&self,
		from: Address,
		user: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError> {
		self.write(&self.compliance, "verifyKYC", (user, status), from, None)
			.await
	}

	async fn set_risk_score(
		&self,
		from: Address,
		user: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.compliance,
			"setRiskScore",
			(user, U256::from(score)),
			from,
			None,
		)
		.await
	}

	async fn submit_proof_to_defi(
		&self,
		from: Address,
		user: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.write(&self.compliance, "submitProofToDefi", user, from, None)
			.await
	}

	async fn set_defi_contract(
		&self,
		from: Address,
		defi_contract: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.write(
			&self.compliance,
			"setDefiContract",
			defi_contract,
			from,
			None,
		)
		.await
	}

	async fn await_confirmation(&self, pending: &PendingOperation) -> Confirmation {
		let tx_hash = pending.tx_hash;
		debug!(
			"Waiting for {} confirmation(s) of {:?}",
			self.confirmations, tx_hash
		);

		let watcher = PendingTransaction::new(tx_hash, self.client.provider())
			.confirmations(self.confirmations);

		match tokio::time::timeout(self.confirmation_timeout, watcher).await {
			Err(_) => {
				warn!("Timed out waiting for {:?}", tx_hash);
				Confirmation::Failed {
					tx_hash,
					reason: format!(
						"not confirmed within {} seconds",
						self.confirmation_timeout.as_secs()
					),
				}
			}
			Ok(Err(e)) => Confirmation::Failed {
				tx_hash,
				reason: e.to_string(),
			},
			Ok(Ok(None)) => Confirmation::Failed {
				tx_hash,
				reason: "transaction dropped from mempool".to_string(),
			},
			Ok(Ok(Some(receipt))) => {
				if receipt.status == Some(U64::one()) {
					let block_number = receipt.block_number.map(|n| n.as_u64());
					info!("Transaction {:?} confirmed in block {:?}", tx_hash, block_number);
					Confirmation::Confirmed {
						tx_hash,
						block_number,
					}
				} else {
					Confirmation::Failed {
						tx_hash,
						reason: "transaction reverted".to_string(),
					}
				}
			}
		}
	}
}
