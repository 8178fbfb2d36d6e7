//! Command-line front end for Nebula Wallet
//!
//! Each invocation opens the vault, unlocks the wallet it needs for the
//! command, and locks again on exit. Passwords are read from the terminal,
//! or from `NEBULA_PASSWORD` when set.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use nebula_core::{format_sol, format_ui_amount, MnemonicStrength};
use nebula_params::NetworkType;
use nebula_wallet_service::{NativeTransfer, ServiceConfig, TokenTransfer, WalletService};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const PASSWORD_ENV: &str = "NEBULA_PASSWORD";

#[derive(Parser)]
#[command(name = "nebula")]
#[command(about = "Nebula custodial wallet", long_about = None)]
struct Cli {
    /// Network profile (mainnet, testnet, devnet)
    #[arg(short, long, global = true)]
    network: Option<NetworkType>,

    /// Custom RPC endpoint
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Directory holding the wallet vault
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh recovery phrase without storing it
    Generate {
        /// Phrase length (12 or 24)
        #[arg(short, long, default_value = "12")]
        words: usize,
    },

    /// Create and store a new wallet
    Create {
        /// Wallet name
        #[arg(long, default_value = "")]
        name: String,

        /// Phrase length (12 or 24)
        #[arg(short, long, default_value = "12")]
        words: usize,
    },

    /// Import a wallet from its recovery phrase
    Import {
        /// Wallet name
        #[arg(long, default_value = "")]
        name: String,
    },

    /// List stored wallets
    List,

    /// Delete a stored wallet
    Delete {
        /// Wallet address
        address: String,
    },

    /// Show the recovery phrase of a wallet
    Reveal {
        /// Wallet address
        address: String,
    },

    /// Show the SOL balance of an address
    Balance {
        /// Address
        address: String,
    },

    /// Show token balances of an address
    Tokens {
        /// Address
        address: String,
    },

    /// Check whether an account exists on chain
    Exists {
        /// Address
        address: String,
    },

    /// Estimate the fee of a SOL transfer
    Fee {
        /// Sending wallet, if any
        #[arg(long)]
        from: Option<String>,

        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in SOL
        #[arg(long)]
        amount: String,

        /// Priority fee in micro-lamports per compute unit
        #[arg(long)]
        priority_fee: Option<u64>,
    },

    /// Send SOL
    Send {
        /// Sending wallet
        #[arg(long)]
        from: String,

        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in SOL
        #[arg(long)]
        amount: String,

        /// Priority fee in micro-lamports per compute unit
        #[arg(long)]
        priority_fee: Option<u64>,
    },

    /// Send SPL tokens
    SendToken {
        /// Sending wallet
        #[arg(long)]
        from: String,

        /// Destination wallet address
        #[arg(long)]
        to: String,

        /// Token mint
        #[arg(long)]
        mint: String,

        /// Amount in token units
        #[arg(long)]
        amount: String,

        /// Mint decimals
        #[arg(long)]
        decimals: u8,
    },

    /// Request test SOL from the faucet
    Airdrop {
        /// Address
        address: String,

        /// Amount in SOL
        #[arg(short, long, default_value = "1")]
        amount: String,
    },

    /// Sign a message with a wallet key
    Sign {
        /// Signing wallet
        #[arg(long)]
        from: String,

        /// Message text
        message: String,
    },

    /// Show recent transactions of an address
    History {
        /// Address
        address: String,

        /// Number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(url) = cli.rpc_url {
        config.rpc_url = Some(url);
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.validate()?;

    let service = WalletService::open(config)?;
    info!("Using {}", service.network().name);

    let result = run(&service, cli.command).await;
    service.disconnect();

    if let Err(e) = &result {
        if let Some(wallet_error) = e.downcast_ref::<nebula_core::Error>() {
            if wallet_error.is_user_error() {
                eprintln!("{}", wallet_error.user_message());
                std::process::exit(1);
            }
        }
    }
    result
}

async fn run(service: &WalletService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Generate { words } => {
            let mnemonic = service.generate_mnemonic(strength(words)?)?;
            println!("{}", mnemonic.phrase());
        }
        Commands::Create { name, words } => {
            let password = new_password()?;
            let created = service
                .create_wallet(&password, &name, strength(words)?)
                .await?;
            println!("Created {} ({})", created.wallet.name, created.wallet.public_key);
            println!();
            println!("Write down your recovery phrase and keep it offline:");
            println!("{}", created.mnemonic.phrase());
        }
        Commands::Import { name } => {
            let phrase = rpassword::prompt_password_stdout("Recovery phrase: ")?;
            if !service.validate_mnemonic(&phrase) {
                bail!("the recovery phrase is not valid");
            }
            let password = new_password()?;
            let wallet = service.import_wallet(&phrase, &password, &name).await?;
            println!("Imported {} ({})", wallet.name, wallet.public_key);
        }
        Commands::List => {
            let wallets = service.list_wallets()?;
            if wallets.is_empty() {
                println!("No wallets stored");
            }
            for wallet in wallets {
                let marker = if wallet.readable { "" } else { "  [unreadable]" };
                println!(
                    "{}  {}  {}{}",
                    wallet.public_key,
                    wallet.created_at.format("%Y-%m-%d %H:%M"),
                    wallet.name,
                    marker
                );
            }
        }
        Commands::Delete { address } => {
            if service.delete_wallet(&address)? {
                println!("Deleted {}", address);
            } else {
                println!("No wallet {}", address);
            }
        }
        Commands::Reveal { address } => {
            unlock(service, &address).await?;
            let password = password("Confirm password: ")?;
            let mnemonic = service.reveal_mnemonic(&password).await?;
            println!("{}", mnemonic.phrase());
        }
        Commands::Balance { address } => {
            let lamports = service.get_balance(&address).await?;
            println!("{} SOL", format_sol(lamports));
        }
        Commands::Tokens { address } => {
            let balances = service.get_token_balances(&address).await?;
            if balances.is_empty() {
                println!("No token accounts");
            }
            for balance in balances {
                println!("{}  {}", balance.mint, balance.ui_amount());
            }
        }
        Commands::Exists { address } => {
            let exists = service.account_exists(&address).await?;
            println!("{}", if exists { "exists" } else { "not found" });
        }
        Commands::Fee {
            from,
            to,
            amount,
            priority_fee,
        } => {
            if let Some(from) = from {
                service.select_wallet(&from)?;
            }
            let transfer = NativeTransfer {
                to_address: to,
                amount,
                priority_fee_micro_lamports: priority_fee,
            };
            let fee = service.estimate_fee(&transfer).await?;
            println!("{} SOL", format_sol(fee));
        }
        Commands::Send {
            from,
            to,
            amount,
            priority_fee,
        } => {
            unlock(service, &from).await?;
            let transfer = NativeTransfer {
                to_address: to,
                amount,
                priority_fee_micro_lamports: priority_fee,
            };
            let receipt = with_spinner("Waiting for confirmation", service.transfer_native(&transfer))
                .await?;
            if receipt.recipient_existed == Some(false) {
                println!("Note: the destination account was new");
            }
            println!("{}", receipt.signature);
        }
        Commands::SendToken {
            from,
            to,
            mint,
            amount,
            decimals,
        } => {
            unlock(service, &from).await?;
            let transfer = TokenTransfer {
                to_address: to,
                mint,
                amount,
                decimals,
            };
            let receipt =
                with_spinner("Waiting for confirmation", service.transfer_token(&transfer)).await?;
            println!("{}", receipt.signature);
        }
        Commands::Airdrop { address, amount } => {
            let signature =
                with_spinner("Requesting airdrop", service.request_airdrop(&address, &amount))
                    .await?;
            println!("{}", signature);
        }
        Commands::Sign { from, message } => {
            unlock(service, &from).await?;
            let signature = service.sign_message(message.as_bytes()).await?;
            println!("{}", signature);
        }
        Commands::History { address, limit } => {
            for record in service.transaction_history(&address, limit).await? {
                let when = record
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let fee = record
                    .fee
                    .map(|f| format_ui_amount(f, nebula_params::SOL_DECIMALS))
                    .unwrap_or_else(|| "?".to_string());
                let status = if record.success { "ok" } else { "failed" };
                println!(
                    "{}  {}  slot {}  fee {}  {}",
                    when, status, record.slot, fee, record.signature
                );
            }
        }
    }
    Ok(())
}

fn strength(words: usize) -> anyhow::Result<MnemonicStrength> {
    match words {
        12 => Ok(MnemonicStrength::Words12),
        24 => Ok(MnemonicStrength::Words24),
        other => bail!("phrases have 12 or 24 words, not {}", other),
    }
}

fn password(prompt: &str) -> anyhow::Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password_stdout(prompt).context("reading password")
}

fn new_password() -> anyhow::Result<String> {
    let first = password("New password: ")?;
    if std::env::var(PASSWORD_ENV).is_err() {
        let second = rpassword::prompt_password_stdout("Repeat password: ")?;
        if first != second {
            bail!("passwords do not match");
        }
    }
    Ok(first)
}

async fn unlock(service: &WalletService, address: &str) -> anyhow::Result<()> {
    let password = password("Password: ")?;
    service.unlock_session(address, &password).await?;
    Ok(())
}

async fn with_spinner<T, F>(message: &'static str, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = nebula_core::Result<T>>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = fut.await;
    spinner.finish_and_clear();
    Ok(result?)
}
