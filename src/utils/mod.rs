//! Utility module for the compliance client.
//!
//! Re-exports amount conversion helpers used at the decimal/smallest-unit boundary.

/// Decimal amount parsing and formatting
pub mod amount;

pub use amount::{AmountError, format_token_amount, parse_token_amount};
