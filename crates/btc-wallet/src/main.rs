use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use btc_engine::{BtcError, BtcNetwork, ScriptType};
use btc_provider::{Config, EsploraClient};
use btc_wallet::{generate_address, SendError, TransactionSender};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Environment variable holding the sender's WIF for `send`.
const WIF_ENV: &str = "BTC_WALLET_WIF";

#[derive(Parser, Debug)]
#[command(author, version, about = "Build, sign, and broadcast Bitcoin payments", long_about = None)]
struct Cli {
    /// Network: mainnet, testnet, signet or regtest
    #[arg(long, global = true, default_value = "testnet")]
    network: BtcNetwork,

    /// JSON provider config (server_host, use_tls, credentials, timeout_secs)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Provider host and path prefix, overriding the config
    #[arg(long, global = true)]
    server: Option<String>,

    /// Talk plain HTTP to the provider
    #[arg(long, global = true)]
    no_tls: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new key and print its address and WIF
    Generate {
        #[arg(long, value_enum, default_value_t = AddressKind::P2wpkh)]
        kind: AddressKind,
    },
    /// Show the balance of an address
    Balance { address: String },
    /// Send a payment. The sender's WIF is read from BTC_WALLET_WIF, or
    /// from the first line of stdin when that is unset.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in satoshis
        #[arg(long)]
        amount: u64,
        /// Absolute fee in satoshis
        #[arg(long)]
        fee: u64,
        /// Spend outputs that are not yet confirmed
        #[arg(long)]
        include_unconfirmed: bool,
        /// Print the signed transaction instead of broadcasting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the provider's chain tip height
    Tip,
    /// Print the hash of the block at a height
    Block { height: u64 },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AddressKind {
    P2pkh,
    P2wpkh,
}

impl From<AddressKind> for ScriptType {
    fn from(kind: AddressKind) -> Self {
        match kind {
            AddressKind::P2pkh => ScriptType::P2pkh,
            AddressKind::P2wpkh => ScriptType::P2wpkh,
        }
    }
}

fn provider_config(cli: &Cli) -> Result<Config, SendError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::blockstream(cli.network),
    };
    if let Some(server) = &cli.server {
        config.server_host = server.clone();
    }
    if cli.no_tls {
        config.use_tls = false;
    }
    config.validate()?;
    Ok(config)
}

fn connect(cli: &Cli) -> Result<TransactionSender<EsploraClient>, SendError> {
    let client = EsploraClient::new(&provider_config(cli)?)?;
    Ok(TransactionSender::new(client, cli.network))
}

fn read_wif(
    env_value: Option<String>,
    mut input: impl BufRead,
) -> Result<Zeroizing<String>, SendError> {
    let wif = match env_value {
        Some(value) => Zeroizing::new(value),
        None => {
            let mut line = Zeroizing::new(String::new());
            input.read_line(&mut *line).map_err(|e| {
                SendError::Decode(BtcError::InvalidWif(format!("cannot read WIF from stdin: {e}")))
            })?;
            line
        }
    };
    if wif.trim().is_empty() {
        return Err(SendError::Decode(BtcError::InvalidWif(format!(
            "no WIF given; set {WIF_ENV} or pipe it on stdin"
        ))));
    }
    Ok(wif)
}

fn run(cli: &Cli) -> Result<(), SendError> {
    match &cli.command {
        Command::Generate { kind } => {
            let (address, wif) =
                generate_address(cli.network, (*kind).into()).map_err(SendError::Decode)?;
            println!("address: {address}");
            println!("wif:     {}", wif.as_str());
        }
        Command::Tip => {
            println!("{}", connect(cli)?.check_connection()?);
        }
        Command::Block { height } => {
            println!("{}", connect(cli)?.block_hash(*height)?);
        }
        Command::Balance { address } => {
            let balance = connect(cli)?.balance(address)?;
            println!("confirmed:   {} sat", balance.confirmed_sat);
            println!("unconfirmed: {} sat", balance.unconfirmed_sat);
            println!("utxos:       {}", balance.utxo_count);
        }
        Command::Send {
            from,
            to,
            amount,
            fee,
            include_unconfirmed,
            dry_run,
        } => {
            let secret = read_wif(std::env::var(WIF_ENV).ok(), std::io::stdin().lock())?;
            let wif = secret.trim();
            let sender = connect(cli)?.include_unconfirmed(*include_unconfirmed);
            if *dry_run {
                let signed = sender.build(wif, from, to, *amount, *fee)?;
                println!("txid:  {}", signed.txid);
                println!("vsize: {}", signed.tx.vsize());
                println!("{}", signed.raw_hex());
            } else {
                let receipt = sender.send(wif, from, to, *amount, *fee)?;
                println!("{}", receipt.txid);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
