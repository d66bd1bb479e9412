use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::Serialize;

use crate::ledger::TransactionRecord;
use crate::utils::format_token_amount;

/// Complete local view of one account, as read by a single successful refresh.
///
/// Snapshots are never patched: every refresh builds a new one and replaces the previous
/// snapshot as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
	/// Start-order ticket of the refresh that produced this snapshot.
	pub sequence: u64,
	pub account: Address,
	/// Ledger balance in the smallest unit.
	pub balance: U256,
	pub compliance_verified: bool,
	/// Whether the ledger currently reports the account as owner or compliance admin.
	pub is_admin: bool,
	/// The account's transaction log in ledger insertion order.
	pub transactions: Vec<TransactionRecord>,
	pub refreshed_at: DateTime<Utc>,
}

impl AccountSnapshot {
	pub fn display_balance(&self, decimals: u32) -> String {
		format_token_amount(self.balance, decimals)
	}
}
