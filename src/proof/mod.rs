//! Proof artifact generation for privacy-sensitive ledger writes.
//!
//! Every withdraw and private transfer carries a fixed-size commitment that binds the
//! sender, the recipient, the amount and a freshness input. This module defines the
//! artifact type and the generator contract; the two generators behind it are a local
//! hash commitment and a client for a remote proof server.
//!
//! Neither generator is a zero-knowledge proof. The hash commitment hides nothing that
//! a verifier could not brute-force from the ledger call itself, and the remote client
//! only carries whatever the server produces. Any security claim needs a real
//! commitment/nullifier scheme behind [`ProofGenerator`].

/// Local keccak commitment over the canonical inputs
pub mod commitment;
/// Remote proof server integration
pub mod remote_prover;

pub use commitment::HashCommitmentProver;
pub use remote_prover::RemoteProofGenerator;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fixed-size commitment attached to withdraw and transfer calls (`bytes32` on chain).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProofArtifact(pub [u8; 32]);

impl ProofArtifact {
	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}

	pub fn as_h256(&self) -> H256 {
		H256::from(self.0)
	}
}

impl From<H256> for ProofArtifact {
	fn from(value: H256) -> Self {
		Self(value.0)
	}
}

impl fmt::Display for ProofArtifact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl fmt::Debug for ProofArtifact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ProofArtifact({self})")
	}
}

impl FromStr for ProofArtifact {
	type Err = ProofError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let digits = s.strip_prefix("0x").unwrap_or(s);
		let bytes = hex::decode(digits)
			.map_err(|e| ProofError::ProofGenerationFailed(format!("invalid proof hex: {e}")))?;
		let bytes: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
			ProofError::ProofGenerationFailed(format!(
				"proof must be 32 bytes, got {}",
				bytes.len()
			))
		})?;
		Ok(Self(bytes))
	}
}

impl Serialize for ProofArtifact {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for ProofArtifact {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
	#[error("proof generation failed: {0}")]
	ProofGenerationFailed(String),
}

/// Produces the proof artifact for a (sender, recipient, amount) triple.
///
/// Two calls with identical arguments must return different artifacts. The call may
/// complete immediately or suspend on a remote prover; callers treat both the same.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
	async fn generate_proof(
		&self,
		sender: Address,
		recipient: Address,
		amount: U256,
	) -> Result<ProofArtifact, ProofError>;

	/// Get the name of this generator for logging.
	fn name(&self) -> &'static str;
}
