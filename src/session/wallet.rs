//! Wallet collaborators: the account source and signer behind a session.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::Address;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
	#[error("wallet request failed: {0}")]
	Request(String),
}

/// Source of the identities a session can be opened with.
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Asks the wallet for its accounts; the first one becomes the session identity.
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
}

/// Accounts managed by the node (or browser-bridged wallet) behind the RPC endpoint.
///
/// Writes sent from these accounts are signed by the node itself.
pub struct NodeWallet<M> {
	client: Arc<M>,
}

impl<M: Middleware + 'static> NodeWallet<M> {
	pub fn new(client: Arc<M>) -> Self {
		Self { client }
	}
}

#[async_trait]
impl<M: Middleware + 'static> WalletProvider for NodeWallet<M> {
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		let accounts: Vec<Address> = self
			.client
			.provider()
			.request("eth_requestAccounts", ())
			.await
			.map_err(|e| WalletError::Request(e.to_string()))?;
		debug!("Wallet returned {} account(s)", accounts.len());
		Ok(accounts)
	}
}

/// A single local signing key; its address is the only account.
pub struct LocalKeyWallet {
	address: Address,
}

impl LocalKeyWallet {
	pub fn new(address: Address) -> Self {
		Self { address }
	}
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		Ok(vec![self.address])
	}
}
