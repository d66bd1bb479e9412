//! Conversion between decimal display amounts and smallest-unit integers.
//!
//! Amounts cross the ledger boundary as `uint256` values in the smallest unit. The
//! decimal form only exists at the edges (user input, notifications, CLI output), so
//! every conversion goes through these two functions and never through floats.

use ethers::types::U256;
use ethers::utils::{ParseUnits, format_units, parse_units};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
	#[error("invalid amount '{0}'")]
	Invalid(String),

	#[error("amount must be greater than zero")]
	Zero,

	#[error("amount '{0}' cannot be negative")]
	Negative(String),
}

/// Parses a decimal string such as `"1.5"` into smallest units with `decimals` places.
pub fn parse_token_amount(amount: &str, decimals: u32) -> Result<U256, AmountError> {
	let trimmed = amount.trim();
	if trimmed.is_empty() {
		return Err(AmountError::Invalid(amount.to_string()));
	}

	match parse_units(trimmed, decimals).map_err(|_| AmountError::Invalid(amount.to_string()))? {
		ParseUnits::U256(value) => {
			if value.is_zero() {
				Err(AmountError::Zero)
			} else {
				Ok(value)
			}
		}
		ParseUnits::I256(_) => Err(AmountError::Negative(amount.to_string())),
	}
}

/// Formats a smallest-unit amount as a decimal string without trailing zeros.
pub fn format_token_amount(amount: U256, decimals: u32) -> String {
	let formatted = match format_units(amount, decimals) {
		Ok(formatted) => formatted,
		Err(_) => return amount.to_string(),
	};

	if !formatted.contains('.') {
		return formatted;
	}
	let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
	if trimmed.is_empty() {
		"0".to_string()
	} else {
		trimmed.to_string()
	}
}
