//! testnet-wallet: command-line front end for the single-address
//! BIP-84 testnet wallet.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use wallet_core::config::{WalletConfig, DEFAULT_CONFIG_PATH};
use wallet_core::EsploraWallet;

/// Bitcoin testnet wallet with one BIP-84 receive address.
#[derive(Parser)]
#[command(name = "testnet-wallet")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the wallet's receive address.
    Address,
    /// Show confirmed and unconfirmed balance.
    Balance,
    /// Send satoshis to a testnet address.
    Send {
        /// Destination address.
        address: String,
        /// Amount in satoshis.
        amount: u64,
    },
    /// Show a transaction and what it paid this wallet.
    Tx {
        /// Transaction id (hex).
        txid: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = WalletConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let wallet = EsploraWallet::open(&cfg).context("Failed to open wallet")?;
    debug!(network = %wallet.network(), "wallet ready");

    match cli.command {
        Commands::Address => {
            let address = wallet.get_address()?;
            println!("Wallet address: {address}");
        }
        Commands::Balance => {
            let balance = wallet.get_balance()?;
            println!("Wallet balance:");
            println!("    Available: {} satoshi", balance.confirmed_sat);
            println!("    On hold:   {} satoshi", balance.unconfirmed_sat);
        }
        Commands::Send { address, amount } => {
            let txid = wallet
                .send_to(&address, amount)
                .with_context(|| format!("Failed to send {amount} satoshi to {address}"))?;
            println!("Sent {amount} satoshi to {address}");
            println!("Transaction ID: {txid}");
        }
        Commands::Tx { txid } => {
            let view = wallet.get_transaction(&txid)?;
            let status = if view.tx.status.confirmed {
                match view.tx.status.block_height {
                    Some(height) => format!("confirmed at height {height}"),
                    None => "confirmed".to_string(),
                }
            } else {
                "unconfirmed".to_string()
            };
            println!("Transaction {}", view.tx.txid);
            println!("    Status:  {status}");
            println!("    Inputs:  {}", view.tx.vin.len());
            println!("    Outputs: {}", view.tx.vout.len());
            println!("    Fee:     {} satoshi", view.tx.fee);
            println!(
                "    Received by this wallet: {} satoshi (outputs {:?})",
                view.received_sat, view.own_outputs
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_send() {
        let cli = Cli::try_parse_from([
            "testnet-wallet",
            "--config",
            "wallet.yaml",
            "send",
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
            "40000",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("wallet.yaml"));
        match cli.command {
            Commands::Send { address, amount } => {
                assert_eq!(address, "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx");
                assert_eq!(amount, 40_000);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn rejects_negative_amount() {
        assert!(Cli::try_parse_from(["testnet-wallet", "send", "tb1q", "-5"]).is_err());
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::try_parse_from(["testnet-wallet", "balance"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
