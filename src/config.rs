//! Client configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;
use thiserror::Error;

use crate::notification::DEFAULT_NOTIFICATION_TTL;
use crate::sync::DEFAULT_REFRESH_INTERVAL;
use crate::transaction::{DEFAULT_TOKEN_DECIMALS, DEFAULT_TOKEN_SYMBOL, TokenConfig};

pub const DEFAULT_RPC_URL: &str = "https://sepolia.base.org";
/// Base Sepolia.
pub const DEFAULT_CHAIN_ID: u64 = 84532;
pub const DEFAULT_DEFI_CONTRACT: &str = "0x7E3DE9bB767E6a36f686262D5fB9226BD5146783";
pub const DEFAULT_COMPLIANCE_CONTRACT: &str = "0xaEF0cC12F1ac324F774291cEC9e1903090eFD5b0";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
	#[error("{name} has an invalid value '{value}': {reason}")]
	Invalid {
		name: &'static str,
		value: String,
		reason: String,
	},
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// JSON-RPC endpoint of the ledger chain.
	pub rpc_url: String,
	pub chain_id: u64,
	/// Privacy-preserving DeFi ledger contract.
	pub defi_contract: Address,
	/// Compliance verifier contract.
	pub compliance_contract: Address,
	/// Hex private key; without it the node's own accounts sign.
	pub wallet_private_key: Option<String>,
	/// Base URL of a proof server; without it proofs are local hash commitments.
	pub proof_server_url: Option<String>,
	pub refresh_interval: Duration,
	pub notification_ttl: Duration,
	/// Confirmations to wait for before a write counts as confirmed.
	pub confirmations: usize,
	pub confirmation_timeout: Duration,
	pub token: TokenConfig,
}

impl ClientConfig {
	/// Load configuration from environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Load configuration through `lookup`, falling back to defaults for unset values.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

		let rpc_url = get("LEDGER_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
		let chain_id = parse_or(&get, "CHAIN_ID", DEFAULT_CHAIN_ID)?;
		let defi_contract = parse_or(
			&get,
			"DEFI_CONTRACT_ADDRESS",
			parse_default(DEFAULT_DEFI_CONTRACT)?,
		)?;
		let compliance_contract = parse_or(
			&get,
			"COMPLIANCE_CONTRACT_ADDRESS",
			parse_default(DEFAULT_COMPLIANCE_CONTRACT)?,
		)?;

		let wallet_private_key = get("WALLET_PRIVATE_KEY");
		let proof_server_url = get("PROOF_SERVER_URL");

		let refresh_interval = Duration::from_secs(parse_or(
			&get,
			"REFRESH_INTERVAL_SECS",
			DEFAULT_REFRESH_INTERVAL.as_secs(),
		)?);
		if refresh_interval.is_zero() {
			return Err(ConfigError::Invalid {
				name: "REFRESH_INTERVAL_SECS",
				value: "0".to_string(),
				reason: "must be at least one second".to_string(),
			});
		}
		let notification_ttl = Duration::from_secs(parse_or(
			&get,
			"NOTIFICATION_TTL_SECS",
			DEFAULT_NOTIFICATION_TTL.as_secs(),
		)?);
		let confirmations = parse_or(&get, "CONFIRMATIONS", 1usize)?;
		let confirmation_timeout =
			Duration::from_secs(parse_or(&get, "CONFIRMATION_TIMEOUT_SECS", 120u64)?);

		let token = TokenConfig {
			decimals: parse_or(&get, "TOKEN_DECIMALS", DEFAULT_TOKEN_DECIMALS)?,
			symbol: get("TOKEN_SYMBOL").unwrap_or_else(|| DEFAULT_TOKEN_SYMBOL.to_string()),
		};

		Ok(Self {
			rpc_url,
			chain_id,
			defi_contract,
			compliance_contract,
			wallet_private_key,
			proof_server_url,
			refresh_interval,
			notification_ttl,
			confirmations,
			confirmation_timeout,
			token,
		})
	}
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
	G: Fn(&str) -> Option<String>,
{
	match get(name) {
		Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
			name,
			reason: e.to_string(),
			value,
		}),
		None => Ok(default),
	}
}

fn parse_default(address: &'static str) -> Result<Address, ConfigError> {
	address.parse().map_err(|e: <Address as FromStr>::Err| ConfigError::Invalid {
		name: "default address",
		value: address.to_string(),
		reason: e.to_string(),
	})
}
