//! In-memory ledger used by the unit tests.
//!
//! Mirrors the contract rules the client depends on (balance checks, the compliance
//! gate, owner/admin-only writes) and adds fault injection, per-call latency and a log
//! of every call made through the gateway.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, H256, TxHash, U256};

use super::{
	ComplianceAttestation, Confirmation, LedgerError, LedgerGateway, PendingOperation,
	TransactionRecord,
};
use crate::proof::ProofArtifact;

pub(crate) struct InMemoryLedger {
	state: Mutex<LedgerState>,
}

struct LedgerState {
	owner: Address,
	compliance_admin: Address,
	defi_contract: Address,
	min_compliance_score: u64,
	balances: HashMap<Address, U256>,
	compliant: HashSet<Address>,
	kyc: HashMap<Address, bool>,
	risk_scores: HashMap<Address, u64>,
	verifiers: HashMap<Address, bool>,
	logs: HashMap<Address, Vec<TransactionRecord>>,
	receipts: HashMap<TxHash, Confirmation>,
	next_tx: u64,
	calls: Vec<&'static str>,
	failing: HashSet<&'static str>,
	balance_delays: VecDeque<Duration>,
	revert_next: bool,
}

impl LedgerState {
	fn enter(&mut self, call: &'static str) -> Result<(), LedgerError> {
		self.calls.push(call);
		if self.failing.contains(call) {
			return Err(LedgerError::remote(format!("{call}: connection reset")));
		}
		Ok(())
	}

	fn require_admin(&self, from: Address) -> Result<(), String> {
		if from == self.owner || from == self.compliance_admin {
			Ok(())
		} else {
			Err("execution reverted: Unauthorized".to_string())
		}
	}

	fn balance(&self, account: Address) -> U256 {
		self.balances.get(&account).copied().unwrap_or_default()
	}

	/// Runs a write: rejections surface at submission, effects apply unless the receipt
	/// is set to revert.
	fn submit(
		&mut self,
		call: &'static str,
		effect: impl FnOnce(&mut LedgerState) -> Result<(), String>,
	) -> Result<PendingOperation, LedgerError> {
		self.enter(call)?;
		self.next_tx += 1;
		let tx_hash = H256::from_low_u64_be(self.next_tx);

		let receipt = if std::mem::take(&mut self.revert_next) {
			Confirmation::Failed {
				tx_hash,
				reason: "transaction reverted".to_string(),
			}
		} else {
			effect(self).map_err(LedgerError::remote)?;
			Confirmation::Confirmed {
				tx_hash,
				block_number: Some(self.next_tx),
			}
		};
		self.receipts.insert(tx_hash, receipt);
		Ok(PendingOperation::new(tx_hash))
	}
}

impl InMemoryLedger {
	pub fn new() -> Self {
		let owner = Address::repeat_byte(0x0a);
		Self {
			state: Mutex::new(LedgerState {
				owner,
				compliance_admin: owner,
				defi_contract: Address::repeat_byte(0xdf),
				min_compliance_score: 0,
				balances: HashMap::new(),
				compliant: HashSet::new(),
				kyc: HashMap::new(),
				risk_scores: HashMap::new(),
				verifiers: HashMap::new(),
				logs: HashMap::new(),
				receipts: HashMap::new(),
				next_tx: 0,
				calls: Vec::new(),
				failing: HashSet::new(),
				balance_delays: VecDeque::new(),
				revert_next: false,
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, LedgerState> {
		self.state.lock().unwrap()
	}

	pub fn owner_address(&self) -> Address {
		self.lock().owner
	}

	pub fn set_compliance_admin_address(&self, admin: Address) {
		self.lock().compliance_admin = admin;
	}

	pub fn set_balance(&self, account: Address, balance: U256) {
		self.lock().balances.insert(account, balance);
	}

	pub fn set_compliant(&self, account: Address, compliant: bool) {
		let mut state = self.lock();
		if compliant {
			state.compliant.insert(account);
		} else {
			state.compliant.remove(&account);
		}
	}

	pub fn kyc_of(&self, account: Address) -> bool {
		self.lock().kyc.get(&account).copied().unwrap_or(false)
	}

	pub fn push_record(&self, account: Address, record: TransactionRecord) {
		self.lock().logs.entry(account).or_default().push(record);
	}

	/// Every call made so far, in order.
	pub fn calls(&self) -> Vec<&'static str> {
		self.lock().calls.clone()
	}

	pub fn call_count(&self, call: &str) -> usize {
		self.lock().calls.iter().filter(|c| **c == call).count()
	}

	pub fn clear_calls(&self) {
		self.lock().calls.clear();
	}

	/// Makes every subsequent call named `call` fail with a remote error.
	pub fn fail_on(&self, call: &'static str) {
		self.lock().failing.insert(call);
	}

	/// The next `get_balance` reads its value immediately and returns after `delay`.
	pub fn delay_next_balance(&self, delay: Duration) {
		self.lock().balance_delays.push_back(delay);
	}

	/// The next write is accepted but its receipt reports a revert.
	pub fn revert_next_write(&self) {
		self.lock().revert_next = true;
	}
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
	async fn get_balance(&self, account: Address) -> Result<U256, LedgerError> {
		let (balance, delay) = {
			let mut state = self.lock();
			state.enter("get_balance")?;
			(state.balance(account), state.balance_delays.pop_front())
		};
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		Ok(balance)
	}

	async fn get_compliance_status(&self, user: Address) -> Result<bool, LedgerError> {
		let mut state = self.lock();
		state.enter("get_compliance_status")?;
		Ok(state.compliant.contains(&user))
	}

	async fn owner(&self) -> Result<Address, LedgerError> {
		let mut state = self.lock();
		state.enter("owner")?;
		Ok(state.owner)
	}

	async fn compliance_admin(&self) -> Result<Address, LedgerError> {
		let mut state = self.lock();
		state.enter("compliance_admin")?;
		Ok(state.compliance_admin)
	}

	async fn get_transaction_count(&self, user: Address) -> Result<u64, LedgerError> {
		let mut state = self.lock();
		state.enter("get_transaction_count")?;
		Ok(state.logs.get(&user).map_or(0, |log| log.len() as u64))
	}

	async fn get_transaction_details(
		&self,
		user: Address,
		index: u64,
	) -> Result<TransactionRecord, LedgerError> {
		let mut state = self.lock();
		state.enter("get_transaction_details")?;
		state
			.logs
			.get(&user)
			.and_then(|log| log.get(index as usize))
			.cloned()
			.ok_or_else(|| LedgerError::remote("execution reverted: Invalid index"))
	}

	async fn get_kyc_status(&self, user: Address) -> Result<bool, LedgerError> {
		let mut state = self.lock();
		state.enter("get_kyc_status")?;
		Ok(state.kyc.get(&user).copied().unwrap_or(false))
	}

	async fn get_risk_score(&self, user: Address) -> Result<u64, LedgerError> {
		let mut state = self.lock();
		state.enter("get_risk_score")?;
		Ok(state.risk_scores.get(&user).copied().unwrap_or(0))
	}

	async fn defi_contract(&self) -> Result<Address, LedgerError> {
		let mut state = self.lock();
		state.enter("defi_contract")?;
		Ok(state.defi_contract)
	}

	async fn generate_compliance_proof(
		&self,
		user: Address,
	) -> Result<ComplianceAttestation, LedgerError> {
		let mut state = self.lock();
		state.enter("generate_compliance_proof")?;
		Ok(ComplianceAttestation {
			kyc_hash: H256::from(ethers::utils::keccak256(user.as_bytes())),
			aml_verification: H256::repeat_byte(0x01),
			risk_score: state.risk_scores.get(&user).copied().unwrap_or(0),
		})
	}

	async fn deposit(&self, from: Address, amount: U256) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("deposit", |state| {
			*state.balances.entry(from).or_default() += amount;
			Ok(())
		})
	}

	async fn withdraw(
		&self,
		from: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("withdraw", |state| {
			let balance = state.balance(from);
			if balance < amount {
				return Err("execution reverted: Insufficient balance".to_string());
			}
			state.balances.insert(from, balance - amount);
			state.logs.entry(from).or_default().push(TransactionRecord {
				proof,
				recipient: from,
				amount,
				timestamp: Utc::now(),
				compliance_verified: state.compliant.contains(&from),
			});
			Ok(())
		})
	}

	async fn private_transfer(
		&self,
		from: Address,
		recipient: Address,
		amount: U256,
		proof: ProofArtifact,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("private_transfer", |state| {
			if !state.compliant.contains(&from) {
				return Err("execution reverted: User not compliance verified".to_string());
			}
			let balance = state.balance(from);
			if balance < amount {
				return Err("execution reverted: Insufficient balance".to_string());
			}
			state.balances.insert(from, balance - amount);
			*state.balances.entry(recipient).or_default() += amount;
			state.logs.entry(from).or_default().push(TransactionRecord {
				proof,
				recipient,
				amount,
				timestamp: Utc::now(),
				compliance_verified: true,
			});
			Ok(())
		})
	}

	async fn submit_compliance_proof(
		&self,
		from: Address,
		_kyc_hash: H256,
		_aml_verification: H256,
		risk_score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("submit_compliance_proof", |state| {
			if !state.verifiers.get(&from).copied().unwrap_or(false) {
				return Err("execution reverted: Not a compliance verifier".to_string());
			}
			if risk_score >= state.min_compliance_score {
				state.compliant.insert(from);
			}
			Ok(())
		})
	}

	async fn set_compliance_verifier(
		&self,
		from: Address,
		verifier: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("set_compliance_verifier", |state| {
			state.require_admin(from)?;
			state.verifiers.insert(verifier, status);
			Ok(())
		})
	}

	async fn set_compliance_admin(
		&self,
		from: Address,
		admin: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("set_compliance_admin", |state| {
			state.require_admin(from)?;
			state.compliance_admin = admin;
			Ok(())
		})
	}

	async fn set_min_compliance_score(
		&self,
		from: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("set_min_compliance_score", |state| {
			state.require_admin(from)?;
			state.min_compliance_score = score;
			Ok(())
		})
	}

	async fn verify_kyc(
		&self,
		from: Address,
		user: Address,
		status: bool,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("verify_kyc", |state| {
			state.require_admin(from)?;
			state.kyc.insert(user, status);
			Ok(())
		})
	}

	async fn set_risk_score(
		&self,
		from: Address,
		user: Address,
		score: u64,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("set_risk_score", |state| {
			state.require_admin(from)?;
			state.risk_scores.insert(user, score);
			Ok(())
		})
	}

	async fn submit_proof_to_defi(
		&self,
		from: Address,
		user: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("submit_proof_to_defi", |state| {
			state.require_admin(from)?;
			if !state.kyc.get(&user).copied().unwrap_or(false) {
				return Err("execution reverted: KYC not verified".to_string());
			}
			state.compliant.insert(user);
			Ok(())
		})
	}

	async fn set_defi_contract(
		&self,
		from: Address,
		defi_contract: Address,
	) -> Result<PendingOperation, LedgerError> {
		self.lock().submit("set_defi_contract", |state| {
			state.require_admin(from)?;
			state.defi_contract = defi_contract;
			Ok(())
		})
	}

	async fn await_confirmation(&self, pending: &PendingOperation) -> Confirmation {
		let mut state = self.lock();
		state.calls.push("await_confirmation");
		state
			.receipts
			.get(&pending.tx_hash)
			.cloned()
			.unwrap_or_else(|| Confirmation::Failed {
				tx_hash: pending.tx_hash,
				reason: "unknown transaction".to_string(),
			})
	}
}
