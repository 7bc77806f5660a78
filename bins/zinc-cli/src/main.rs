//! zinc-cli: Command-line interface to a zinc wallet.
//!
//! Creates and restores encrypted wallet files, answers queries against
//! the stored wallet state and signs payments from it. Network sync and
//! broadcast are the embedding application's job; this tool works from what
//! the wallet file already knows.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use zinc_core::address::Network;
use zinc_core::constants::COIN;
use zinc_wallet::{FileStore, KeyPath, Wallet, WalletConfig, WalletStore};

/// Zinc command-line wallet interface.
#[derive(Parser)]
#[command(name = "zinc-cli")]
#[command(version, about = "Non-custodial HD wallet")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to wallet file (default: <data dir>/zinc/<network>/wallet.dat).
    #[arg(short, long, global = true)]
    wallet: Option<PathBuf>,

    /// Path to a config file (default: <config dir>/zinc/config.toml, if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network (mainnet or testnet). Overrides the config file.
    #[arg(short, long, global = true)]
    network: Option<Network>,

    /// Log filter, e.g. `debug` or `zinc_wallet=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management subcommands.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Show the current receive address.
    Address,
    /// Show the wallet balance.
    Balance,
    /// List recent transactions, newest first.
    History(HistoryArgs),
    /// Check whether an address belongs to this wallet.
    Check(CheckArgs),
    /// Show the key at a derivation index.
    Derive(DeriveArgs),
    /// Build and sign a payment and print it as raw hex. Nothing is broadcast.
    Send(SendArgs),
}

#[derive(Subcommand)]
enum WalletAction {
    /// Create a new HD wallet.
    Create,
    /// Restore a wallet from seed phrase.
    Restore(WalletRestoreArgs),
}

#[derive(Args)]
struct WalletRestoreArgs {
    /// Seed phrase. If not provided, will prompt securely.
    #[arg(short, long)]
    phrase: Option<String>,

    /// Prompt for a BIP-39 passphrase.
    #[arg(long)]
    with_passphrase: bool,
}

#[derive(Args)]
struct HistoryArgs {
    /// Maximum number of entries.
    #[arg(short, long, default_value = "20")]
    limit: usize,
}

#[derive(Args)]
struct CheckArgs {
    /// Address to check.
    address: String,
}

#[derive(Args)]
struct DeriveArgs {
    /// Address index on the chain.
    #[arg(short, long)]
    index: u32,

    /// Use the change chain instead of the receive chain.
    #[arg(long)]
    change: bool,
}

#[derive(Args)]
struct SendArgs {
    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount to send in coins (e.g. 0.0005).
    #[arg(short, long, value_parser = parse_amount)]
    amount: u64,

    /// Fee rate in base units per 1000 bytes (default: from config).
    #[arg(long)]
    fee_rate: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.log_level.as_deref(), &cli.global.log_format)?;

    let config = settings::load_wallet_config(cli.global.config.as_deref(), cli.global.network)?;
    let wallet_path = match cli.global.wallet {
        Some(p) => p,
        None => settings::default_wallet_path(config.network)?,
    };

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create => wallet_create(config, wallet_path),
            WalletAction::Restore(args) => wallet_restore(config, wallet_path, args),
        },
        Commands::Address => wallet_address(config, wallet_path),
        Commands::Balance => wallet_balance(config, wallet_path),
        Commands::History(args) => wallet_history(config, wallet_path, args),
        Commands::Check(args) => wallet_check(config, wallet_path, args),
        Commands::Derive(args) => wallet_derive(config, wallet_path, args),
        Commands::Send(args) => wallet_send(config, wallet_path, args),
    }
}

/// Log to stderr so stdout carries only command output.
///
/// `format = "json"` emits one JSON object per event; anything else is
/// human-readable text.
fn init_logging(level: Option<&str>, format: &str) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = match level {
        Some(l) => EnvFilter::try_new(l).with_context(|| format!("Invalid log level: {l}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

/// Create a new wallet with a random seed.
fn wallet_create(config: WalletConfig, wallet_path: PathBuf) -> Result<()> {
    if wallet_path.exists() {
        bail!("Wallet file already exists: {}", wallet_path.display());
    }
    let password = prompt_new_password()?;
    let network = config.network;

    let store = Arc::new(FileStore::new(&wallet_path, password.as_bytes()));
    let (wallet, phrase) = Wallet::create(config, store).context("Failed to create wallet")?;

    println!("\n=== WALLET CREATED ===");
    println!("Network: {network}");
    println!("\nSEED PHRASE (BACK THIS UP, 12 WORDS):");
    println!("  {}", phrase.as_str());
    println!("\nWARNING: This seed phrase will NOT be shown again.");
    println!("Store it in a secure location. Anyone with this phrase can access your funds.");
    println!("\nReceive address: {}", wallet.receive_address()?);
    println!("Wallet saved to: {}", wallet_path.display());
    Ok(())
}

/// Restore a wallet from a seed phrase.
fn wallet_restore(config: WalletConfig, wallet_path: PathBuf, args: WalletRestoreArgs) -> Result<()> {
    if wallet_path.exists() {
        bail!("Wallet file already exists: {}", wallet_path.display());
    }

    let phrase = match args.phrase {
        Some(p) => p,
        None => prompt_password("Enter seed phrase")?,
    };
    let passphrase = if args.with_passphrase {
        prompt_password("Enter BIP-39 passphrase")?
    } else {
        String::new()
    };
    zinc_wallet::validate_phrase(&phrase).context("Invalid seed phrase")?;

    let password = prompt_new_password()?;
    let network = config.network;
    let store = Arc::new(FileStore::new(&wallet_path, password.as_bytes()));
    let wallet = Wallet::from_phrase(&phrase, &passphrase, config, store).context("Failed to restore wallet")?;

    println!("\n=== WALLET RESTORED ===");
    println!("Network: {network}");
    println!("Receive address: {}", wallet.receive_address()?);
    println!("Wallet saved to: {}", wallet_path.display());
    Ok(())
}

fn open_wallet(config: WalletConfig, wallet_path: PathBuf) -> Result<Wallet> {
    if !wallet_path.exists() {
        bail!("No wallet at {} (run `zinc-cli wallet create`)", wallet_path.display());
    }
    let password = prompt_password("Wallet password")?;
    let store: Arc<dyn WalletStore> = Arc::new(FileStore::new(&wallet_path, password.as_bytes()));
    let wallet = Wallet::load(config, store).context("Failed to load wallet (check password)")?;
    info!(path = %wallet_path.display(), "opened wallet");
    Ok(wallet)
}

/// Display the current receive address.
fn wallet_address(config: WalletConfig, wallet_path: PathBuf) -> Result<()> {
    let wallet = open_wallet(config, wallet_path)?;
    println!("{}", wallet.receive_address()?);
    Ok(())
}

/// Display the wallet balance as last synced.
fn wallet_balance(config: WalletConfig, wallet_path: PathBuf) -> Result<()> {
    let wallet = open_wallet(config, wallet_path)?;
    let balance = wallet.balance_details();
    let tip = wallet.snapshot().utxos.tip();

    println!("\n=== WALLET BALANCE ===");
    println!("Spendable:   {}", format_amount(balance.spendable));
    println!("Confirmed:   {}", format_amount(balance.confirmed));
    println!("Unconfirmed: {}", format_amount(balance.unconfirmed));
    println!("Outputs:     {}", balance.utxo_count);
    match tip {
        Some(h) => println!("Synced to height {h}"),
        None => println!("Not synced yet"),
    }
    Ok(())
}

/// List recent transactions.
fn wallet_history(config: WalletConfig, wallet_path: PathBuf, args: HistoryArgs) -> Result<()> {
    let wallet = open_wallet(config, wallet_path)?;
    let history = wallet.recent_transactions();
    if history.is_empty() {
        println!("No transactions");
        return Ok(());
    }
    for entry in history.take(args.limit) {
        let when = chrono::DateTime::from_timestamp(entry.timestamp as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let net = entry.net();
        let sign = if net < 0 { "-" } else { "+" };
        let flag = if entry.conflicted { " (conflicted)" } else { "" };
        println!(
            "{when}  {sign}{}  conf={}  {}{flag}",
            format_amount(net.unsigned_abs()),
            entry.confirmations,
            entry.txid
        );
    }
    Ok(())
}

/// Report whether an address is one of ours.
fn wallet_check(config: WalletConfig, wallet_path: PathBuf, args: CheckArgs) -> Result<()> {
    let wallet = open_wallet(config, wallet_path)?;
    let owned = wallet.check_address(&args.address).context("Invalid address")?;
    if owned {
        println!("{} belongs to this wallet", args.address);
    } else {
        println!("{} does not belong to this wallet", args.address);
    }
    Ok(())
}

/// Show the public key and address at a derivation index.
fn wallet_derive(config: WalletConfig, wallet_path: PathBuf, args: DeriveArgs) -> Result<()> {
    let network = config.network;
    let wallet = open_wallet(config, wallet_path)?;
    let path = if args.change {
        KeyPath::internal(args.index)
    } else {
        KeyPath::external(args.index)
    };
    let key = wallet.derive_key(path).context("Derivation failed")?;

    println!("Path:       {}", path.full_path(network));
    println!("Address:    {}", key.address());
    println!("Public key: {}", hex::encode(key.public_key()));
    println!("Owned:      {}", wallet.is_owned(&key.address()));
    Ok(())
}

/// Build and sign a payment, then print the raw transaction.
fn wallet_send(config: WalletConfig, wallet_path: PathBuf, args: SendArgs) -> Result<()> {
    let wallet = open_wallet(config, wallet_path)?;
    let built = match args.fee_rate {
        Some(rate) => wallet.build_transaction_with_fee_rate(args.amount, &args.to, rate),
        None => wallet.build_transaction(args.amount, &args.to),
    }
    .context("Failed to build transaction")?;
    info!(txid = %built.txid(), fee = built.fee, inputs = built.inputs.len(), "signed transaction");

    println!("\n=== TRANSACTION SIGNED ===");
    println!("Txid:   {}", built.txid());
    println!("To:     {}", args.to);
    println!("Amount: {}", format_amount(args.amount));
    println!("Fee:    {}", format_amount(built.fee));
    if let Some(change) = &built.change {
        println!("Change: {} to {}", format_amount(change.amount), change.address);
    }
    println!("\n{}", built.tx.to_hex());
    Ok(())
}

/// Parse a coin amount with up to eight decimals into base units.
fn parse_amount(s: &str) -> Result<u64, String> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err("empty amount".into());
    }
    if frac.len() > 8 {
        return Err("at most 8 decimal places".into());
    }
    let digits = |part: &str| part.is_empty() || part.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(frac) {
        return Err(format!("invalid amount: {s}"));
    }
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| format!("invalid amount: {s}"))?
    };
    let frac: u64 = format!("{frac:0<8}").parse().map_err(|_| format!("invalid amount: {s}"))?;
    let sats = whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| format!("amount too large: {s}"))?;
    if sats == 0 {
        return Err("amount must be positive".into());
    }
    Ok(sats)
}

/// Whole coins with eight decimals, e.g. `0.00039000`.
fn format_amount(sats: u64) -> String {
    format!("{}.{:08}", sats / COIN, sats % COIN)
}

/// Prompt for a password securely (no echo).
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("Enter wallet password")?;
    let confirm = prompt_password("Confirm password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}
