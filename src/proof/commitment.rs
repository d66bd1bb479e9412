//! Hash commitment stand-in for a zero-knowledge prover.
//!
//! The artifact is `keccak256(abi.encode(sender, recipient, amount, timestamp, nonce))`.
//! The timestamp advances strictly between calls on the same prover and the nonce is 32
//! random bytes, so two otherwise identical operations never share an artifact.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ethers::abi::{Token, encode};
use ethers::types::{Address, U256};
use ethers::utils::keccak256;
use rand::Rng;
use tracing::debug;

use super::{ProofArtifact, ProofError, ProofGenerator};

#[derive(Debug, Default)]
pub struct HashCommitmentProver {
	/// Last timestamp (unix nanos) folded into a commitment
	last_timestamp: AtomicU64,
}

impl HashCommitmentProver {
	pub fn new() -> Self {
		Self::default()
	}

	/// Computes the commitment for fully specified inputs.
	pub fn commit(
		sender: Address,
		recipient: Address,
		amount: U256,
		timestamp: u64,
		nonce: [u8; 32],
	) -> ProofArtifact {
		let encoded = encode(&[
			Token::Address(sender),
			Token::Address(recipient),
			Token::Uint(amount),
			Token::Uint(U256::from(timestamp)),
			Token::FixedBytes(nonce.to_vec()),
		]);
		ProofArtifact(keccak256(encoded))
	}

	/// Wall-clock nanos, bumped past the previous value when the clock did not move.
	fn next_timestamp(&self) -> u64 {
		let now = chrono::Utc::now()
			.timestamp_nanos_opt()
			.and_then(|nanos| u64::try_from(nanos).ok())
			.unwrap_or_default();
		let advance = |last: u64| now.max(last.saturating_add(1));

		let previous = self
			.last_timestamp
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(advance(last)))
			.unwrap_or_else(|last| last);
		advance(previous)
	}
}

#[async_trait]
impl ProofGenerator for HashCommitmentProver {
	async fn generate_proof(
		&self,
		sender: Address,
		recipient: Address,
		amount: U256,
	) -> Result<ProofArtifact, ProofError> {
		let timestamp = self.next_timestamp();
		let mut nonce = [0u8; 32];
		rand::rng().fill(&mut nonce);

		let artifact = Self::commit(sender, recipient, amount, timestamp, nonce);
		debug!("Generated commitment {} at {}", artifact, timestamp);
		Ok(artifact)
	}

	fn name(&self) -> &'static str {
		"HashCommitmentProver"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn identical_inputs_give_distinct_artifacts() {
		let prover = HashCommitmentProver::new();
		let sender = Address::repeat_byte(0x11);
		let recipient = Address::repeat_byte(0x22);
		let amount = U256::from(1_500u64);

		let first = prover
			.generate_proof(sender, recipient, amount)
			.await
			.expect("proof");
		let second = prover
			.generate_proof(sender, recipient, amount)
			.await
			.expect("proof");

		assert_ne!(first, second);
	}

	#[test]
	fn commitment_depends_on_every_input() {
		let sender = Address::repeat_byte(0x11);
		let recipient = Address::repeat_byte(0x22);
		let amount = U256::from(10u64);
		let base = HashCommitmentProver::commit(sender, recipient, amount, 1, [0; 32]);

		assert_eq!(
			base,
			HashCommitmentProver::commit(sender, recipient, amount, 1, [0; 32])
		);
		assert_ne!(
			base,
			HashCommitmentProver::commit(recipient, sender, amount, 1, [0; 32])
		);
		assert_ne!(
			base,
			HashCommitmentProver::commit(sender, recipient, amount + 1, 1, [0; 32])
		);
		assert_ne!(
			base,
			HashCommitmentProver::commit(sender, recipient, amount, 2, [0; 32])
		);
		assert_ne!(
			base,
			HashCommitmentProver::commit(sender, recipient, amount, 1, [1; 32])
		);
	}

	#[test]
	fn timestamps_strictly_advance() {
		let prover = HashCommitmentProver::new();
		let mut last = prover.next_timestamp();
		for _ in 0..1_000 {
			let next = prover.next_timestamp();
			assert!(next > last);
			last = next;
		}
	}
}
