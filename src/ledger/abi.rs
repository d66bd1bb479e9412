use ethers::abi::{Abi, Function, Param, ParamType, StateMutability, parse_abi};

use super::LedgerError;

/// Surface of the `PrivacyPreservingDeFi` contract used by the client.
const PRIVACY_PRESERVING_DEFI: &[&str] = &[
	"function getBalance() view returns (uint256)",
	"function getUserComplianceStatus(address _user) view returns (bool)",
	"function getTransactionCount(address _user) view returns (uint256)",
	"function owner() view returns (address)",
	"function complianceAdmin() view returns (address)",
	"function deposit() payable",
	"function withdraw(uint256 _amount, bytes32 _zkProof)",
	"function privateTransfer(address _recipient, uint256 _amount, bytes32 _zkProof)",
	"function submitComplianceProof(bytes32 _kycHash, bytes32 _amlVerification, uint256 _riskScore)",
	"function setComplianceVerifier(address _verifier, bool _status)",
	"function setComplianceAdmin(address _newAdmin)",
	"function setMinComplianceScore(uint256 _newScore)",
];

/// Surface of the `ComplianceVerifier` contract used by the client.
const COMPLIANCE_VERIFIER: &[&str] = &[
	"function getKYCStatus(address _user) view returns (bool)",
	"function getRiskScore(address _user) view returns (uint256)",
	"function generateComplianceProof(address _user) view returns (bytes32, bytes32, uint256)",
	"function owner() view returns (address)",
	"function defiContract() view returns (address)",
	"function verifyKYC(address _user, bool _status)",
	"function setRiskScore(address _user, uint256 _score)",
	"function submitProofToDefi(address _user)",
	"function setDefiContract(address _defiContract)",
];

pub(super) fn defi_abi() -> Result<Abi, LedgerError> {
	let mut abi = parse_abi(PRIVACY_PRESERVING_DEFI).map_err(LedgerError::remote)?;
	let details = transaction_details();
	abi.functions.insert(details.name.clone(), vec![details]);
	Ok(abi)
}

fn param(name: &str, kind: ParamType) -> Param {
	Param {
		name: name.to_string(),
		kind,
		internal_type: None,
	}
}

/// `getTransactionDetails` returns one `Transaction` struct. The human-readable parser
/// flattens a tuple output into its fields, so this entry is declared by hand.
#[allow(deprecated)]
fn transaction_details() -> Function {
	Function {
		name: "getTransactionDetails".to_string(),
		inputs: vec![
			param("_user", ParamType::Address),
			param("_txId", ParamType::Uint(256)),
		],
		outputs: vec![param(
			"",
			ParamType::Tuple(vec![
				ParamType::FixedBytes(32),
				ParamType::Address,
				ParamType::Uint(256),
				ParamType::Uint(256),
				ParamType::Bool,
			]),
		)],
		constant: None,
		state_mutability: StateMutability::View,
	}
}

pub(super) fn compliance_abi() -> Result<Abi, LedgerError> {
	parse_abi(COMPLIANCE_VERIFIER).map_err(LedgerError::remote)
}
