use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bitcoin::bip32::Fingerprint;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use ssm::config::DEFAULT_KEYS_DIR;
use ssm::{Chain, Ssm, SsmConfig, rpc};

#[derive(Parser)]
#[command(author, version, about = "Software secured module: key custody and signing")]
struct Cli {
    /// Key store root
    #[arg(short, long, env = "SSM_KEYS_DIR", default_value = DEFAULT_KEYS_DIR)]
    keys_dir: PathBuf,

    /// Allow exporting master private keys
    #[arg(long, env = "SSM_DEBUG")]
    debug: bool,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new master key from a password, or from raw hex entropy with --isbytes
    NewMaster {
        #[arg(short, long)]
        chain: Chain,
        #[arg(short, long)]
        entropy: String,
        #[arg(long)]
        isbytes: bool,
    },
    /// Import an extended private key (and master blinding key on Elements chains)
    RestoreMaster {
        #[arg(short, long)]
        chain: Chain,
        #[arg(long)]
        extended_key: String,
        #[arg(long)]
        blinding_key: Option<String>,
    },
    /// Derive the native segwit (or confidential) address at a path
    NewAddress {
        #[arg(short, long)]
        chain: Chain,
        #[arg(short, long)]
        fingerprint: Fingerprint,
        #[arg(short, long)]
        path: String,
    },
    GetXpub {
        #[arg(short, long)]
        chain: Chain,
        #[arg(short, long)]
        fingerprint: Fingerprint,
    },
    /// Debug only: print the master private key
    GetXprv {
        #[arg(short, long)]
        chain: Chain,
        #[arg(short, long)]
        fingerprint: Fingerprint,
    },
    /// Sign every witness-less input of a transaction
    SignTx {
        #[arg(short, long)]
        chain: Chain,
        #[arg(short, long)]
        tx: String,
        /// Space-separated, one per input
        #[arg(long)]
        fingerprints: String,
        /// Space-separated, one per input
        #[arg(long)]
        paths: String,
        /// Space-separated, one per input
        #[arg(long)]
        values: String,
    },
    /// Serve line-delimited JSON-RPC 2.0 on stdin/stdout
    Rpc,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn serve_rpc(ssm: &Ssm) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(stdout, "{}", rpc::handle(ssm, &line))?;
        stdout.flush()?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<Option<Value>> {
    let ssm = Ssm::new(SsmConfig::new(cli.keys_dir).with_debug(cli.debug));

    let out = match cli.command {
        Command::NewMaster {
            chain,
            entropy,
            isbytes,
        } => {
            let fingerprint = ssm.new_wallet(chain, &entropy, isbytes)?;
            json!({ "chain": chain, "fingerprint": fingerprint.to_string() })
        }
        Command::RestoreMaster {
            chain,
            extended_key,
            blinding_key,
        } => {
            let fingerprint = ssm.restore_wallet(chain, &extended_key, blinding_key.as_deref())?;
            json!({ "chain": chain, "fingerprint": fingerprint.to_string() })
        }
        Command::NewAddress {
            chain,
            fingerprint,
            path,
        } => {
            let derived = ssm.get_address(chain, fingerprint, &path)?;
            let mut out = json!({
                "chain": chain,
                "address": derived.address,
                "pubkey": derived.pubkey.to_string(),
            });
            if let Some(key) = derived.blinding_key {
                out["blinding_key"] = Value::String(hex::encode(key.secret_bytes()));
            }
            out
        }
        Command::GetXpub { chain, fingerprint } => {
            json!({ "chain": chain, "xpub": ssm.get_xpub(chain, fingerprint)? })
        }
        Command::GetXprv { chain, fingerprint } => {
            json!({ "chain": chain, "xprv": ssm.get_xprv(chain, fingerprint)? })
        }
        Command::SignTx {
            chain,
            tx,
            fingerprints,
            paths,
            values,
        } => {
            let signed_tx = ssm.sign_tx(chain, &tx, &fingerprints, &paths, &values)?;
            json!({ "chain": chain, "signed_tx": signed_tx })
        }
        Command::Rpc => {
            serve_rpc(&ssm)?;
            return Ok(None);
        }
    };
    Ok(Some(out))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(out) = run(cli)? {
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}
