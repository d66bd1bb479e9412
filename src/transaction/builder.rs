//! Operation builder
//!
//! Turns a caller's [`Operation`] into a [`PreparedOperation`]: amounts converted to the
//! smallest unit, the proof artifact generated for value-moving calls, and the success
//! message fixed before anything is sent.

use ethers::types::{Address, H256, U256};
use ethers::utils::to_checksum;
use tracing::debug;

use super::{Operation, OperationError, OperationKind, TokenConfig};
use crate::ledger::{LedgerError, LedgerGateway, PendingOperation};
use crate::proof::{ProofArtifact, ProofGenerator};
use crate::utils::{format_token_amount, parse_token_amount};

/// A ledger write with every argument resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
	Deposit {
		amount: U256,
	},
	Withdraw {
		amount: U256,
		proof: ProofArtifact,
	},
	PrivateTransfer {
		recipient: Address,
		amount: U256,
		proof: ProofArtifact,
	},
	SubmitComplianceProof {
		kyc_hash: H256,
		aml_verification: H256,
		risk_score: u64,
	},
	SetComplianceVerifier {
		verifier: Address,
		status: bool,
	},
	SetComplianceAdmin {
		admin: Address,
	},
	SetMinComplianceScore {
		score: u64,
	},
	VerifyKyc {
		user: Address,
		status: bool,
	},
	SetRiskScore {
		user: Address,
		score: u64,
	},
	SubmitProofToDefi {
		user: Address,
	},
	SetDefiContract {
		defi_contract: Address,
	},
}

/// An operation ready to be submitted on behalf of `sender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOperation {
	pub kind: OperationKind,
	pub sender: Address,
	pub call: LedgerCall,
	/// Notification text shown once the write is confirmed.
	pub success_message: String,
}

impl PreparedOperation {
	pub async fn submit(
		&self,
		gateway: &dyn LedgerGateway,
	) -> Result<PendingOperation, LedgerError> {
		let from = self.sender;
		match &self.call {
			LedgerCall::Deposit { amount } => gateway.deposit(from, *amount).await,
			LedgerCall::Withdraw { amount, proof } => gateway.withdraw(from, *amount, *proof).await,
			LedgerCall::PrivateTransfer {
				recipient,
				amount,
				proof,
			} => {
				gateway
					.private_transfer(from, *recipient, *amount, *proof)
					.await
			}
			LedgerCall::SubmitComplianceProof {
				kyc_hash,
				aml_verification,
				risk_score,
			} => {
				gateway
					.submit_compliance_proof(from, *kyc_hash, *aml_verification, *risk_score)
					.await
			}
			LedgerCall::SetComplianceVerifier { verifier, status } => {
				gateway.set_compliance_verifier(from, *verifier, *status).await
			}
			LedgerCall::SetComplianceAdmin { admin } => {
				gateway.set_compliance_admin(from, *admin).await
			}
			LedgerCall::SetMinComplianceScore { score } => {
				gateway.set_min_compliance_score(from, *score).await
			}
			LedgerCall::VerifyKyc { user, status } => gateway.verify_kyc(from, *user, *status).await,
			LedgerCall::SetRiskScore { user, score } => {
				gateway.set_risk_score(from, *user, *score).await
			}
			LedgerCall::SubmitProofToDefi { user } => gateway.submit_proof_to_defi(from, *user).await,
			LedgerCall::SetDefiContract { defi_contract } => {
				gateway.set_defi_contract(from, *defi_contract).await
			}
		}
	}
}

/// Builder for [`PreparedOperation`]s
pub struct OperationBuilder<'a> {
	/// The requested operation
	operation: Operation,
	/// Identity the write is sent from; also the proof's sender
	sender: Option<Address>,
	/// Generator for withdraw and transfer artifacts
	proof_generator: Option<&'a dyn ProofGenerator>,
	/// Unit conversion and display settings
	token: TokenConfig,
}

impl<'a> OperationBuilder<'a> {
	pub fn new(operation: Operation) -> Self {
		Self {
			operation,
			sender: None,
			proof_generator: None,
			token: TokenConfig::default(),
		}
	}

	pub fn with_sender(mut self, sender: Address) -> Self {
		self.sender = Some(sender);
		self
	}

	pub fn with_proof_generator(mut self, proof_generator: &'a dyn ProofGenerator) -> Self {
		self.proof_generator = Some(proof_generator);
		self
	}

	pub fn with_token(mut self, token: TokenConfig) -> Self {
		self.token = token;
		self
	}

	/// Resolves amounts and generates the proof artifact if the call needs one.
	pub async fn build(self) -> Result<PreparedOperation, OperationError> {
		let kind = self.operation.kind();
		let sender = self.sender.ok_or(OperationError::Incomplete("sender"))?;
		let decimals = self.token.decimals;
		let symbol = &self.token.symbol;

		let (call, success_message) = match self.operation {
			Operation::Deposit { amount } => {
				let amount = parse_token_amount(&amount, decimals)?;
				(
					LedgerCall::Deposit { amount },
					format!(
						"Successfully deposited {} {}",
						format_token_amount(amount, decimals),
						symbol
					),
				)
			}
			Operation::Withdraw { amount } => {
				let amount = parse_token_amount(&amount, decimals)?;
				// Withdrawals pay out to the sender, so the artifact binds sender twice.
				let proof = Self::prove(self.proof_generator, sender, sender, amount).await?;
				(
					LedgerCall::Withdraw { amount, proof },
					format!(
						"Successfully withdrew {} {}",
						format_token_amount(amount, decimals),
						symbol
					),
				)
			}
			Operation::Transfer { recipient, amount } => {
				let amount = parse_token_amount(&amount, decimals)?;
				let proof = Self::prove(self.proof_generator, sender, recipient, amount).await?;
				(
					LedgerCall::PrivateTransfer {
						recipient,
						amount,
						proof,
					},
					format!(
						"Successfully transferred {} {} to {}",
						format_token_amount(amount, decimals),
						symbol,
						to_checksum(&recipient, None)
					),
				)
			}
			Operation::VerifyKyc { user, status } => (
				LedgerCall::VerifyKyc { user, status },
				format!(
					"Successfully updated KYC status for {}",
					to_checksum(&user, None)
				),
			),
			Operation::SetRiskScore { user, score } => (
				LedgerCall::SetRiskScore { user, score },
				format!(
					"Successfully set risk score for {}",
					to_checksum(&user, None)
				),
			),
			Operation::SetComplianceVerifier { verifier, status } => (
				LedgerCall::SetComplianceVerifier { verifier, status },
				"Successfully updated compliance verifier status".to_string(),
			),
			Operation::SubmitComplianceProof { user } => (
				LedgerCall::SubmitProofToDefi { user },
				format!(
					"Successfully submitted compliance proof for {}",
					to_checksum(&user, None)
				),
			),
			Operation::SubmitComplianceAttestation {
				kyc_hash,
				aml_verification,
				risk_score,
			} => (
				LedgerCall::SubmitComplianceProof {
					kyc_hash,
					aml_verification,
					risk_score,
				},
				"Successfully submitted compliance attestation".to_string(),
			),
			Operation::SetComplianceAdmin { admin } => (
				LedgerCall::SetComplianceAdmin { admin },
				format!(
					"Successfully set compliance admin to {}",
					to_checksum(&admin, None)
				),
			),
			Operation::SetMinComplianceScore { score } => (
				LedgerCall::SetMinComplianceScore { score },
				format!("Successfully set minimum compliance score to {}", score),
			),
			Operation::SetDefiContract { defi_contract } => (
				LedgerCall::SetDefiContract { defi_contract },
				format!(
					"Successfully set DeFi contract to {}",
					to_checksum(&defi_contract, None)
				),
			),
		};

		Ok(PreparedOperation {
			kind,
			sender,
			call,
			success_message,
		})
	}

	async fn prove(
		proof_generator: Option<&dyn ProofGenerator>,
		sender: Address,
		recipient: Address,
		amount: U256,
	) -> Result<ProofArtifact, OperationError> {
		let generator = proof_generator.ok_or(OperationError::Incomplete("proof generator"))?;
		let proof = generator.generate_proof(sender, recipient, amount).await?;
		debug!("Generated proof {} with {}", proof, generator.name());
		Ok(proof)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::proof::{HashCommitmentProver, ProofError};
	use crate::utils::AmountError;

	fn sender() -> Address {
		Address::repeat_byte(0x11)
	}

	#[tokio::test]
	async fn deposit_converts_the_decimal_amount() {
		let prepared = OperationBuilder::new(Operation::Deposit {
			amount: "1.5".to_string(),
		})
		.with_sender(sender())
		.build()
		.await
		.expect("build");

		assert_eq!(
			prepared.call,
			LedgerCall::Deposit {
				amount: U256::from(1_500_000_000_000_000_000u64)
			}
		);
		assert_eq!(prepared.success_message, "Successfully deposited 1.5 ETH");
	}

	#[tokio::test]
	async fn withdraw_binds_the_sender_as_recipient() {
		let prover = HashCommitmentProver::new();
		let prepared = OperationBuilder::new(Operation::Withdraw {
			amount: "2".to_string(),
		})
		.with_sender(sender())
		.with_proof_generator(&prover)
		.build()
		.await
		.expect("build");

		let LedgerCall::Withdraw { amount, proof } = prepared.call else {
			panic!("expected a withdraw call");
		};
		assert_eq!(amount, U256::exp10(18) * U256::from(2));
		assert_ne!(proof, ProofArtifact([0; 32]));
		assert_eq!(prepared.success_message, "Successfully withdrew 2 ETH");
	}

	#[tokio::test]
	async fn transfer_names_the_recipient() {
		let prover = HashCommitmentProver::new();
		let recipient: Address = "0xaef0cc12f1ac324f774291cec9e1903090efd5b0"
			.parse()
			.expect("address");
		let prepared = OperationBuilder::new(Operation::Transfer {
			recipient,
			amount: "0.25".to_string(),
		})
		.with_sender(sender())
		.with_proof_generator(&prover)
		.with_token(TokenConfig {
			decimals: 18,
			symbol: "ETH".to_string(),
		})
		.build()
		.await
		.expect("build");

		assert!(
			prepared
				.success_message
				.starts_with("Successfully transferred 0.25 ETH to 0x")
		);
		assert!(
			prepared
				.success_message
				.to_lowercase()
				.ends_with("0xaef0cc12f1ac324f774291cec9e1903090efd5b0")
		);
	}

	#[tokio::test]
	async fn invalid_input_fails_before_proving() {
		let result = OperationBuilder::new(Operation::Withdraw {
			amount: "0".to_string(),
		})
		.with_sender(sender())
		.build()
		.await;
		assert_eq!(result, Err(OperationError::InvalidAmount(AmountError::Zero)));

		let result = OperationBuilder::new(Operation::Withdraw {
			amount: "1".to_string(),
		})
		.with_sender(sender())
		.build()
		.await;
		assert_eq!(result, Err(OperationError::Incomplete("proof generator")));
	}

	struct FailingProver;

	#[async_trait::async_trait]
	impl ProofGenerator for FailingProver {
		async fn generate_proof(
			&self,
			_sender: Address,
			_recipient: Address,
			_amount: U256,
		) -> Result<ProofArtifact, ProofError> {
			Err(ProofError::ProofGenerationFailed("prover offline".to_string()))
		}

		fn name(&self) -> &'static str {
			"FailingProver"
		}
	}

	#[tokio::test]
	async fn prover_failures_surface_as_proof_errors() {
		let result = OperationBuilder::new(Operation::Transfer {
			recipient: Address::repeat_byte(0x22),
			amount: "1".to_string(),
		})
		.with_sender(sender())
		.with_proof_generator(&FailingProver)
		.build()
		.await;
		assert!(matches!(result, Err(OperationError::Proof(_))));
	}
}
