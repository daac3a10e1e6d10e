//! Offline helpers for cell operations.
//!
//! - `local-config`: print the bundled three-chain network as TOML
//! - `quote`: plan a route against a network and print it as JSON
//! - `decode-payload`: decode a hex cell payload and print it as JSON

use alloy_primitives::{hex, Address, U256};
use cellsim::{init_tracing, LegSpec, PlanRequest, Simulation};
use clap::{Parser, Subcommand};
use config::NetworkConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cellctl")]
#[command(about = "Inspect and plan cell operations")]
struct Cli {
    /// Network description file; the local preset when absent
    #[arg(short, long, global = true)]
    network: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the local network configuration
    LocalConfig,

    /// Plan a route and print the instructions
    Quote {
        /// Chain the operation starts on
        #[arg(long)]
        from: String,

        /// Input token; omit with --native
        #[arg(long)]
        token_in: Option<Address>,

        #[arg(long)]
        amount: U256,

        #[arg(long)]
        sender: Address,

        #[arg(long)]
        receiver: Address,

        /// Route leg: swap:<token>, bridge:<chain> or swap-bridge:<token>:<chain>
        #[arg(long = "leg", required = true)]
        legs: Vec<LegSpec>,

        /// Pay the input as native currency
        #[arg(long)]
        native: bool,

        #[arg(long)]
        payable_receiver: bool,

        #[arg(long)]
        teleporter_fee: Option<U256>,

        #[arg(long)]
        slippage_bips: Option<u16>,
    },

    /// Decode a hex-encoded cell payload
    DecodePayload { payload: String },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing(false);
    let cli = Cli::parse();

    let network = match &cli.network {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::local(),
    };

    match cli.command {
        Command::LocalConfig => {
            print!("{}", network.to_toml()?);
        }
        Command::Quote {
            from,
            token_in,
            amount,
            sender,
            receiver,
            legs,
            native,
            payable_receiver,
            teleporter_fee,
            slippage_bips,
        } => {
            let (sim, _relayer) = Simulation::from_config(network)?;
            let request = PlanRequest {
                source: from,
                token_in: token_in.unwrap_or_default(),
                amount_in: amount,
                sender,
                receiver,
                native,
                payable_receiver,
                teleporter_fee: teleporter_fee.unwrap_or_default(),
                rollback_fee: U256::ZERO,
                slippage_bips,
                source_id: 0,
                third_party_fee: None,
                legs,
            };
            let plan = sim.planner().plan(&request)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::DecodePayload { payload } => {
            let bytes = hex::decode(payload.trim())?;
            let decoded = cell::payload::decode(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
    }

    Ok(())
}
