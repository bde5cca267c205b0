//! DeepChain bridge relayer
//!
//! Runs with the oracle key. Each pass:
//! 1. Pages `TokensDeposited` records from the source node
//! 2. Maps each deposit onto the destination's registry by cross-chain symbol
//! 3. Submits an oracle-signed `ClaimTokens` transaction per deposit
//!
//! The claim proof is the source record's event id, so re-running a pass
//! over records that were already relayed is harmless: the destination
//! answers `ProofAlreadyUsed`.

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deepchain_ledger::relay::SkipReason;
use deepchain_ledger::{
    plan_claim, transaction_message, AssetDirectory, Call, ClaimOrder, EventRecord, Receipt, Transaction,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "relayer")]
#[command(about = "Relay bridge deposits between two DeepChain nodes")]
struct Cli {
    /// Node where deposits are made
    #[arg(long, default_value = "http://localhost:8080")]
    source: String,

    /// Node where claims are submitted
    #[arg(long, default_value = "http://localhost:8081")]
    destination: String,

    /// Oracle private key (hex)
    #[arg(long, env = "ORACLE_PRIVATE_KEY", hide_env_values = true)]
    oracle_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay every deposit after a cursor, once
    Once {
        /// First source sequence to scan
        #[arg(long, default_value = "0")]
        from: u64,
    },

    /// Keep relaying new deposits
    Watch {
        #[arg(long, default_value = "0")]
        from: u64,

        #[arg(long, default_value = "5")]
        poll_interval_secs: u64,
    },

    /// Show the oracle's account on the destination
    Status,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    next: u64,
    events: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeHealth {
    chain_id: u64,
    oracle: Address,
    cross_chain_fee_bps: u64,
    events: u64,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    nonce: u64,
    native_balance: U256,
}

#[derive(Debug, Serialize)]
struct SignedTransaction {
    payload: String,
    signature: String,
}

#[derive(Debug, Default)]
struct PassReport {
    relayed: usize,
    already_relayed: usize,
    skipped: usize,
    failed: usize,
    next: u64,
}

struct Relayer {
    client: Client,
    source: String,
    destination: String,
    oracle: PrivateKeySigner,
}

/// Wrap `tx` the way nodes authenticate it: signature over `transaction_message(payload)`.
fn sign_transaction(signer: &PrivateKeySigner, tx: &Transaction) -> Result<SignedTransaction> {
    let payload = serde_json::to_string(tx)?;
    let signature = signer
        .sign_message_sync(&transaction_message(payload.as_bytes()))
        .context("Failed to sign transaction")?;
    Ok(SignedTransaction {
        payload,
        signature: format!("0x{}", hex::encode(signature.as_bytes())),
    })
}

impl Relayer {
    fn new(source: &str, destination: &str, oracle_key: &str) -> Result<Self> {
        let oracle: PrivateKeySigner = oracle_key
            .trim_start_matches("0x")
            .parse()
            .context("Invalid ORACLE_PRIVATE_KEY")?;
        Ok(Self {
            client: Client::new(),
            source: source.trim_end_matches('/').to_string(),
            destination: destination.trim_end_matches('/').to_string(),
            oracle,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            bail!("GET {} failed ({}): {}", url, status, error_text);
        }
        Ok(resp.json().await?)
    }

    async fn submit(&self, tx: &Transaction) -> Result<Receipt> {
        let url = format!("{}/api/v1/transactions", self.destination);
        let resp = self
            .client
            .post(&url)
            .json(&sign_transaction(&self.oracle, tx)?)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            bail!("Transaction refused: {}", error_text);
        }
        Ok(resp.json().await?)
    }

    /// One relay pass over source records starting at `from`.
    async fn relay_once(&self, from: u64) -> Result<PassReport> {
        let page: EventsPage = self
            .get(format!("{}/api/v1/events?since={}", self.source, from))
            .await
            .context("Failed to read source events")?;
        let mut report = PassReport {
            next: page.next,
            ..PassReport::default()
        };
        if page.events.is_empty() {
            return Ok(report);
        }

        let source_assets: AssetDirectory = self.get(format!("{}/api/v1/assets", self.source)).await?;
        let destination_assets: AssetDirectory =
            self.get(format!("{}/api/v1/assets", self.destination)).await?;

        let orders: Vec<ClaimOrder> = page
            .events
            .iter()
            .filter_map(|record| match plan_claim(record, &source_assets, &destination_assets) {
                Ok(order) => Some(order),
                Err(SkipReason::NotADeposit) => None,
                Err(reason) => {
                    tracing::warn!(id = ?record.id, %reason, "deposit not relayable");
                    report.skipped += 1;
                    None
                }
            })
            .collect();
        if orders.is_empty() {
            return Ok(report);
        }

        let health: NodeHealth = self.get(format!("{}/health", self.destination)).await?;
        if health.oracle != self.oracle.address() {
            bail!(
                "Destination oracle is {}, this key is {}",
                health.oracle,
                self.oracle.address()
            );
        }
        let account: AccountInfo = self
            .get(format!("{}/api/v1/accounts/{}", self.destination, self.oracle.address()))
            .await?;
        let mut nonce = account.nonce;

        for order in orders {
            let tx = Transaction {
                chain_id: health.chain_id,
                nonce,
                value: U256::ZERO,
                call: Call::ClaimTokens {
                    proof: order.proof.clone(),
                    asset: order.asset,
                    recipient: order.recipient,
                    amount: order.amount,
                },
            };
            let receipt = self.submit(&tx).await?;
            // Executed transactions consume the nonce whether or not the call succeeds
            nonce += 1;

            match receipt.error_kind() {
                None => {
                    println!(
                        "[+] Relayed {}:{} -> {} ({} of {})",
                        order.source.chain_id, order.source.sequence, order.recipient, order.amount, order.asset
                    );
                    report.relayed += 1;
                }
                Some("ProofAlreadyUsed") => {
                    tracing::debug!(source = ?order.source, "deposit already relayed");
                    report.already_relayed += 1;
                }
                Some(kind) => {
                    let message = receipt.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default();
                    tracing::warn!(source = ?order.source, kind, message, "claim failed");
                    println!("[!] Claim for {}:{} failed: {}", order.source.chain_id, order.source.sequence, message);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn status(&self) -> Result<()> {
        let health: NodeHealth = self.get(format!("{}/health", self.destination)).await?;
        let account: AccountInfo = self
            .get(format!("{}/api/v1/accounts/{}", self.destination, self.oracle.address()))
            .await?;

        println!("Relayer Status:");
        println!("  Oracle:          {}", self.oracle.address());
        println!("  Authorized:      {}", health.oracle == self.oracle.address());
        println!("  Chain ID:        {}", health.chain_id);
        println!("  Fee (bps):       {}", health.cross_chain_fee_bps);
        println!("  Events:          {}", health.events);
        println!("  Nonce:           {}", account.nonce);
        println!("  Native Balance:  {}", account.native_balance);
        Ok(())
    }
}

fn print_report(report: &PassReport) {
    println!(
        "Pass complete: {} relayed, {} already relayed, {} skipped, {} failed (next cursor {})",
        report.relayed, report.already_relayed, report.skipped, report.failed, report.next
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let relayer = Relayer::new(&cli.source, &cli.destination, &cli.oracle_key)?;

    match cli.command {
        Commands::Once { from } => {
            println!("Relaying deposits from {} since {}...\n", relayer.source, from);
            let report = relayer.relay_once(from).await?;
            print_report(&report);
        }

        Commands::Watch {
            from,
            poll_interval_secs,
        } => {
            let mut cursor = from;
            let mut interval = tokio::time::interval(Duration::from_secs(poll_interval_secs.max(1)));
            tracing::info!(source = %relayer.source, destination = %relayer.destination, "watching for deposits");
            loop {
                interval.tick().await;
                match relayer.relay_once(cursor).await {
                    Ok(report) => {
                        if report.relayed + report.failed > 0 {
                            print_report(&report);
                        }
                        cursor = report.next;
                    }
                    // Cursor stays put; the next pass retries the same page
                    Err(e) => tracing::warn!("relay pass failed: {:#}", e),
                }
            }
        }

        Commands::Status => relayer.status().await?,
    }

    Ok(())
}
