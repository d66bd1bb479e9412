/// Builder that resolves an operation into a ledger call
pub mod builder;
/// Operation requests, phases and outcomes
pub mod operation;
/// Runs operations end to end
pub mod orchestrator;

pub use builder::{LedgerCall, OperationBuilder, PreparedOperation};
pub use operation::{Operation, OperationError, OperationKind, OperationOutcome, OperationPhase};
pub use orchestrator::{ComplianceProfile, TransactionOrchestrator};

/// Number of decimal places of the ledger's native token (ETH).
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

pub const DEFAULT_TOKEN_SYMBOL: &str = "ETH";

/// How amounts are converted and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
	pub decimals: u32,
	pub symbol: String,
}

impl Default for TokenConfig {
	fn default() -> Self {
		Self {
			decimals: DEFAULT_TOKEN_DECIMALS,
			symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
		}
	}
}
