//! `btc-wallet`: command-line front-end over the wallet service.
//!
//! Every subcommand prints its result as JSON on stdout. Logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use btc_wallet_core::chain::Network;
use btc_wallet_core::config::load_with_env;
use btc_wallet_core::keys::{GenerationMethod, KeyRequest, ScriptFormat};
use btc_wallet_core::observability::logging;
use btc_wallet_core::tx::{PrevoutSpec, TxInputSpec, TxOutputSpec};
use btc_wallet_core::WalletService;

#[derive(Parser)]
#[command(name = "btc-wallet")]
#[command(about = "Bitcoin key, transaction and chain-data tool", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network to use instead of the configured one.
    #[arg(short, long)]
    network: Option<Network>,

    /// Serve cached data only; never query the network.
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the address of a key (WIF, hex, xprv/tprv or hex seed)
    Derive {
        key: String,
        #[arg(short, long, default_value = "p2wpkh")]
        format: ScriptFormat,
    },
    /// Generate or restore key material
    Generate {
        #[arg(short, long, default_value = "bip39")]
        method: GenerationMethod,
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long)]
        passphrase: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(short, long, default_value = "p2wpkh")]
        format: ScriptFormat,
    },
    /// Current fee-rate estimate
    Fees,
    /// Build an unsigned transaction from JSON input and output lists
    Build {
        #[arg(long)]
        inputs: String,
        #[arg(long)]
        outputs: String,
        #[arg(long)]
        fee_rate: Option<f64>,
    },
    /// Sign a hex transaction
    Sign {
        tx_hex: String,
        #[arg(short, long)]
        key: String,
        /// JSON list of spent outputs (`{value, script}` or null per input)
        #[arg(long)]
        prevouts: Option<String>,
    },
    /// Validate a hex transaction
    Validate {
        tx_hex: String,
        /// JSON list of input hints (`{txid, vout, value?, address?}`)
        #[arg(long)]
        inputs: Option<String>,
    },
    /// Balance of an address
    Balance { address: String },
    /// Unspent outputs of an address
    Utxos { address: String },
    /// Confirmation status of a transaction
    Status { txid: String },
    /// Report whether the engine is effectively offline
    Offline,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_with_env(cli.config.as_deref())?;
    logging::init(&config.observability.log_level);

    if cli.offline {
        config.offline_mode = true;
    }
    let network = cli.network.unwrap_or(config.network);
    let service = WalletService::from_config(config)?;

    match cli.command {
        Commands::Derive { key, format } => {
            print_json(&service.derive_address(&key, format, network)?)?;
        }
        Commands::Generate { method, mnemonic, passphrase, path, format } => {
            let request = KeyRequest {
                method,
                network,
                mnemonic,
                passphrase,
                derivation_path: path,
                format,
            };
            print_json(&service.generate_key(&request)?)?;
        }
        Commands::Fees => {
            print_json(&service.estimate_fees(network, false).await)?;
        }
        Commands::Build { inputs, outputs, fee_rate } => {
            let inputs: Vec<TxInputSpec> = serde_json::from_str(&inputs)?;
            let outputs: Vec<TxOutputSpec> = serde_json::from_str(&outputs)?;
            print_json(&service.build_transaction(&inputs, &outputs, fee_rate, network)?)?;
        }
        Commands::Sign { tx_hex, key, prevouts } => {
            let prevouts: Vec<Option<PrevoutSpec>> = match prevouts {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            print_json(&service.sign_transaction(&tx_hex, &key, network, &prevouts))?;
        }
        Commands::Validate { tx_hex, inputs } => {
            let hints: Vec<TxInputSpec> = match inputs {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            print_json(&service.validate_transaction(&tx_hex, network, &hints, false).await)?;
        }
        Commands::Balance { address } => {
            let lookup = service.get_balance(&address, network, false).await;
            print_json(&serde_json::json!({
                "address": address,
                "network": network,
                "balance": lookup.value,
                "source": lookup.source,
                "availability": lookup.availability(),
            }))?;
        }
        Commands::Utxos { address } => {
            let lookup = service.get_utxos(&address, network, false).await;
            print_json(&serde_json::json!({
                "address": address,
                "network": network,
                "utxos": lookup.value,
                "source": lookup.source,
                "availability": lookup.availability(),
            }))?;
        }
        Commands::Status { txid } => {
            print_json(&service.get_transaction_status(&txid, network, false).await?)?;
        }
        Commands::Offline => {
            let offline = service.is_offline(network).await;
            print_json(&serde_json::json!({ "network": network, "offline": offline }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
