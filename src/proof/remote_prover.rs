//! Remote proof server integration.
//!
//! Sends the canonical proof inputs to an HTTP proof server and reads back a 32-byte
//! artifact. The freshness inputs (timestamp and nonce) are chosen on the client so the
//! server cannot hand out the same artifact twice for one operation. Requests are never
//! retried here; a failed request surfaces as `ProofGenerationFailed`.

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use rand::Rng;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{ProofArtifact, ProofError, ProofGenerator};

/// Remote proof server client
pub struct RemoteProofGenerator {
	http_client: Client,
	prove_url: Url,
}

#[derive(Debug, Serialize)]
struct ProveRequest {
	sender: Address,
	recipient: Address,
	/// Smallest-unit amount as a decimal string
	amount: String,
	timestamp: i64,
	nonce: String,
}

#[derive(Debug, Deserialize)]
struct ProveResponse {
	proof: String,
}

impl RemoteProofGenerator {
	/// Creates a client for the proof server rooted at `url` (requests go to `{url}/prove`).
	pub fn new(url: &str, timeout: Duration) -> Result<Self, ProofError> {
		// Without a trailing slash `join` would replace the last path segment.
		let prove_url = Url::parse(&format!("{}/", url.trim_end_matches('/')))
			.and_then(|base| base.join("prove"))
			.map_err(|e| {
				ProofError::ProofGenerationFailed(format!("invalid proof server URL: {e}"))
			})?;

		let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
			ProofError::ProofGenerationFailed(format!("failed to create HTTP client: {e}"))
		})?;

		Ok(Self {
			http_client,
			prove_url,
		})
	}

	fn decode_response(body: ProveResponse) -> Result<ProofArtifact, ProofError> {
		if body.proof.is_empty() {
			return Err(ProofError::ProofGenerationFailed(
				"proof server returned an empty proof".to_string(),
			));
		}
		body.proof.parse()
	}
}

#[async_trait]
impl ProofGenerator for RemoteProofGenerator {
	async fn generate_proof(
		&self,
		sender: Address,
		recipient: Address,
		amount: U256,
	) -> Result<ProofArtifact, ProofError> {
		let mut nonce = [0u8; 32];
		rand::rng().fill(&mut nonce);

		let request = ProveRequest {
			sender,
			recipient,
			amount: amount.to_string(),
			timestamp: chrono::Utc::now().timestamp_millis(),
			nonce: format!("0x{}", hex::encode(nonce)),
		};
		debug!("Requesting proof from {}", self.prove_url);

		let response = self
			.http_client
			.post(self.prove_url.clone())
			.json(&request)
			.send()
			.await
			.map_err(|e| {
				error!("Proof server send error: {}", e);
				ProofError::ProofGenerationFailed(e.to_string())
			})?;

		if !response.status().is_success() {
			return Err(ProofError::ProofGenerationFailed(format!(
				"proof server responded with HTTP {}",
				response.status()
			)));
		}

		let body: ProveResponse = response.json().await.map_err(|e| {
			error!("Proof server response error: {}", e);
			ProofError::ProofGenerationFailed(e.to_string())
		})?;

		Self::decode_response(body)
	}

	fn name(&self) -> &'static str {
		"RemoteProofGenerator"
	}
}
