use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use ethers::utils::to_checksum;
use tracing::info;

use zk_compliance_client::events::LoggingEventHandler;
use zk_compliance_client::ledger::EthersLedgerGateway;
use zk_compliance_client::proof::RemoteProofGenerator;
use zk_compliance_client::session::{LocalKeyWallet, NodeWallet, WalletProvider};
use zk_compliance_client::sync::AccountSnapshot;
use zk_compliance_client::transaction::{OperationOutcome, TokenConfig};
use zk_compliance_client::utils::format_token_amount;
use zk_compliance_client::{ClientConfig, ComplianceClient};

const PROOF_SERVER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about = "Client for the compliance-gated privacy DeFi ledger", long_about = None)]
struct Cli {
	/// Overrides LEDGER_RPC_URL
	#[arg(long, global = true)]
	rpc_url: Option<String>,
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Show balance, compliance and admin status of the connected account
	Status {
		#[arg(long)]
		json: bool,
	},
	/// List the connected account's transaction log
	History {
		#[arg(long)]
		json: bool,
	},
	Deposit {
		amount: String,
	},
	Transfer {
		recipient: Address,
		amount: String,
	},
	Withdraw {
		amount: String,
	},
	/// Show KYC, risk score and compliance status of a user (admin)
	Inspect {
		user: Address,
	},
	#[command(subcommand)]
	Admin(AdminCommand),
	/// Keep the session open and print every snapshot until Ctrl-C
	Watch,
}

#[derive(Subcommand)]
enum AdminCommand {
	VerifyKyc {
		user: Address,
		#[arg(long)]
		revoke: bool,
	},
	RiskScore {
		user: Address,
		score: u64,
	},
	Verifier {
		verifier: Address,
		#[arg(long)]
		revoke: bool,
	},
	/// Push the verifier's compliance view of a user to the DeFi ledger
	SubmitProof {
		user: Address,
	},
	/// Submit the verifier's attestation for a user as this account
	Attest {
		user: Address,
	},
	SetAdmin {
		admin: Address,
	},
	MinScore {
		score: u64,
	},
	SetDefi {
		defi_contract: Address,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("ethers_providers=warn".parse()?)
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	dotenvy::dotenv().ok();
	let cli = Cli::parse();
	let mut config = ClientConfig::from_env()?;
	if let Some(rpc_url) = cli.rpc_url {
		config.rpc_url = rpc_url;
	}

	info!("Ledger RPC: {}", config.rpc_url);
	let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
		.with_context(|| format!("invalid RPC URL {}", config.rpc_url))?;

	let client = match &config.wallet_private_key {
		Some(key) => {
			let signer = LocalWallet::from_str(key)
				.context("WALLET_PRIVATE_KEY is not a valid private key")?
				.with_chain_id(config.chain_id);
			let wallet = Arc::new(LocalKeyWallet::new(signer.address()));
			build_client(Arc::new(SignerMiddleware::new(provider, signer)), wallet, &config)?
		}
		None => {
			let provider = Arc::new(provider);
			let wallet = Arc::new(NodeWallet::new(provider.clone()));
			build_client(provider, wallet, &config)?
		}
	};

	let session = client.connect().await?;
	let Some(account) = session.address else {
		bail!("no account available");
	};
	info!("Connected as {}", to_checksum(&account, None));

	let result = run(&client, cli.command, &config.token).await;
	client.disconnect();
	result
}

fn build_client<M: Middleware + 'static>(
	middleware: Arc<M>,
	wallet: Arc<dyn WalletProvider>,
	config: &ClientConfig,
) -> anyhow::Result<ComplianceClient> {
	let gateway = EthersLedgerGateway::new(
		middleware,
		config.defi_contract,
		config.compliance_contract,
	)?
	.with_confirmations(config.confirmations, config.confirmation_timeout);

	let mut builder = ComplianceClient::builder(Arc::new(gateway), wallet)
		.with_event_handler(Box::new(LoggingEventHandler))
		.with_refresh_interval(config.refresh_interval)
		.with_notification_ttl(config.notification_ttl)
		.with_token(config.token.clone());
	if let Some(url) = &config.proof_server_url {
		builder = builder.with_proof_generator(Arc::new(RemoteProofGenerator::new(
			url,
			PROOF_SERVER_TIMEOUT,
		)?));
	}
	Ok(builder.build())
}

async fn run(
	client: &ComplianceClient,
	command: Command,
	token: &TokenConfig,
) -> anyhow::Result<()> {
	let orchestrator = client.orchestrator();

	let outcome = match command {
		Command::Status { json } => {
			let snapshot = current_snapshot(client)?;
			if json {
				println!("{}", serde_json::to_string_pretty(&snapshot)?);
			} else {
				print_status(&snapshot, token);
			}
			return Ok(());
		}
		Command::History { json } => {
			let snapshot = current_snapshot(client)?;
			if json {
				println!("{}", serde_json::to_string_pretty(&snapshot.transactions)?);
			} else {
				print_history(&snapshot, token);
			}
			return Ok(());
		}
		Command::Inspect { user } => {
			let Some(profile) = orchestrator.inspect_user(user).await else {
				bail!("inspecting users requires an admin account");
			};
			println!("{}", serde_json::to_string_pretty(&profile?)?);
			return Ok(());
		}
		Command::Watch => return watch(client, token).await,
		Command::Deposit { amount } => orchestrator.deposit(&amount).await,
		Command::Transfer { recipient, amount } => {
			orchestrator.transfer(recipient, &amount).await
		}
		Command::Withdraw { amount } => orchestrator.withdraw(&amount).await,
		Command::Admin(admin) => match admin {
			AdminCommand::VerifyKyc { user, revoke } => {
				orchestrator.verify_kyc(user, !revoke).await
			}
			AdminCommand::RiskScore { user, score } => {
				orchestrator.set_risk_score(user, score).await
			}
			AdminCommand::Verifier { verifier, revoke } => {
				orchestrator
					.set_compliance_verifier(verifier, !revoke)
					.await
			}
			AdminCommand::SubmitProof { user } => {
				orchestrator.submit_compliance_proof(user).await
			}
			AdminCommand::Attest { user } => {
				let attestation = client
					.gateway()
					.generate_compliance_proof(user)
					.await
					.context("failed to read the verifier's attestation")?;
				orchestrator
					.submit_compliance_attestation(
						attestation.kyc_hash,
						attestation.aml_verification,
						attestation.risk_score,
					)
					.await
			}
			AdminCommand::SetAdmin { admin } => {
				orchestrator.set_compliance_admin(admin).await
			}
			AdminCommand::MinScore { score } => {
				orchestrator.set_min_compliance_score(score).await
			}
			AdminCommand::SetDefi { defi_contract } => {
				orchestrator.set_defi_contract(defi_contract).await
			}
		},
	};

	if let Some(notification) = client.notifications().current() {
		println!("[{}] {}", notification.kind, notification.message);
	}
	match outcome {
		OperationOutcome::Confirmed { tx_hash, .. } => {
			info!("Transaction hash: {:?}", tx_hash);
			Ok(())
		}
		OperationOutcome::Rejected => bail!("operation requires an admin account"),
		OperationOutcome::Failed { error } => Err(error.into()),
	}
}

fn current_snapshot(client: &ComplianceClient) -> anyhow::Result<AccountSnapshot> {
	client
		.snapshot()
		.context("account state could not be loaded")
}

fn print_status(snapshot: &AccountSnapshot, token: &TokenConfig) {
	println!("Account:     {}", to_checksum(&snapshot.account, None));
	println!(
		"Balance:     {} {}",
		snapshot.display_balance(token.decimals),
		token.symbol
	);
	println!("Compliant:   {}", snapshot.compliance_verified);
	println!("Admin:       {}", snapshot.is_admin);
	println!("Transactions: {}", snapshot.transactions.len());
}

fn print_history(snapshot: &AccountSnapshot, token: &TokenConfig) {
	if snapshot.transactions.is_empty() {
		println!("No transactions");
		return;
	}
	for (index, record) in snapshot.transactions.iter().enumerate() {
		println!(
			"#{:<3} {}  {} {} -> {}  compliant: {}  proof: {}",
			index,
			record.timestamp.format("%Y-%m-%d %H:%M:%S"),
			format_token_amount(record.amount, token.decimals),
			token.symbol,
			to_checksum(&record.recipient, None),
			record.compliance_verified,
			record.proof
		);
	}
}

async fn watch(client: &ComplianceClient, token: &TokenConfig) -> anyhow::Result<()> {
	let mut snapshots = client.subscribe_snapshot();
	let mut notifications = client.notifications().subscribe();

	if let Some(snapshot) = snapshots.borrow_and_update().clone() {
		print_status(&snapshot, token);
	}

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Stopping watch");
				break;
			}
			changed = snapshots.changed() => {
				if changed.is_err() {
					break;
				}
				if let Some(snapshot) = snapshots.borrow_and_update().clone() {
					print_status(&snapshot, token);
				}
			}
			changed = notifications.changed() => {
				if changed.is_err() {
					break;
				}
				if let Some(notification) = notifications.borrow_and_update().clone() {
					println!("[{}] {}", notification.kind, notification.message);
				}
			}
		}
	}

	info!("{}", client.refresh_stats().summary());
	Ok(())
}
