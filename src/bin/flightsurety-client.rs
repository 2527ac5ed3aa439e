//! Command-line client for the FlightSurety contracts.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flightsurety_server::client::{FlightSuretyClient, WithdrawOutcome};
use flightsurety_server::config::{ClientConfig, ContractsConfig};
use flightsurety_server::contract::units::format_ether;
use flightsurety_server::contract::RpcContract;

/// Talks to the FlightSurety app contract on behalf of the first node account.
#[derive(Debug, Parser)]
#[command(name = "flightsurety-client", version, propagate_version = true)]
struct Cli {
    /// JSON-RPC endpoint of the Ethereum node.
    #[arg(long, env = "ETH_RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the owner, airline and passenger accounts.
    Accounts,
    /// Check whether the app contract is operational.
    Operational,
    /// Request a flight status from the oracles and wait for consensus.
    Status { flight: String },
    /// Buy insurance for a flight, paying the given amount of ether.
    Buy { flight: String, ether: String },
    /// Claim insurance for a flight, refreshing its status first if stale.
    Claim { flight: String },
    /// Show the insurance credit of the owner account.
    Credit,
    /// Withdraw the owner's insurance credit.
    Withdraw,
    /// Fund the data contract with the given amount of ether.
    Fund { ether: String },
    /// Register a flight for the first airline.
    RegisterFlight { flight: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut contracts = ContractsConfig::from_env().context("invalid contract configuration")?;
    if let Some(rpc_url) = cli.rpc_url {
        contracts.rpc_url = rpc_url;
    }
    let client_config = ClientConfig::from_env().context("invalid client configuration")?;
    let contract = Arc::new(RpcContract::new(contracts)?);
    let client = FlightSuretyClient::connect(contract, client_config)
        .await
        .context("could not connect to the node")?;

    match cli.command {
        Command::Accounts => {
            let roles = client.accounts();
            println!("owner: {}", roles.owner);
            for airline in &roles.airlines {
                println!("airline: {airline}");
            }
            for passenger in &roles.passengers {
                println!("passenger: {passenger}");
            }
        }
        Command::Operational => {
            let operational = client.is_operational().await?;
            println!("operational: {operational}");
        }
        Command::Status { flight } => {
            let status = client.fetch_flight_status(&flight).await?;
            println!("{flight}: {status}");
        }
        Command::Buy { flight, ether } => {
            let receipt = client.buy_insurance(&flight, &ether).await?;
            println!(
                "insured {} for {} ETH (tx {})",
                receipt.flight,
                format_ether(receipt.amount_wei),
                receipt.tx_hash
            );
        }
        Command::Claim { flight } => {
            let receipt = client.claim_insurance(&flight).await?;
            if let Some(status) = receipt.refreshed_status {
                println!("{flight}: {status}");
            }
            println!("claim submitted (tx {})", receipt.tx_hash);
        }
        Command::Credit => {
            let credit = client.get_credit().await?;
            println!("credit: {} ETH", format_ether(credit));
        }
        Command::Withdraw => {
            // Each run starts with an empty ledger.
            client.get_credit().await?;
            match client.withdraw().await? {
                WithdrawOutcome::NothingToWithdraw => println!("nothing to withdraw"),
                WithdrawOutcome::Withdrawn { amount_wei, tx_hash } => {
                    println!("withdrew {} ETH (tx {tx_hash})", format_ether(amount_wei));
                }
            }
        }
        Command::Fund { ether } => {
            let receipt = client.fund(&ether).await?;
            println!(
                "funded {} ETH from {} (airline active: {})",
                format_ether(receipt.funds_wei),
                receipt.funder,
                receipt.active
            );
        }
        Command::RegisterFlight { flight } => {
            let tx_hash = client.register_flight(&flight).await?;
            println!("registered {flight} (tx {tx_hash})");
        }
    }

    Ok(())
}
