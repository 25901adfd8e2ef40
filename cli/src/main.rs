//! chainsearch CLI: fetch every event a contract ever emitted.
//!
//! # Commands
//! ```text
//! chainsearch events --rpc <url> --address <addr> (--abi <path.json> | --erc20)
//!                    [--from-block N | --blocks-ago N] [--to-block N]
//!                    [--batches N] [--workers N] [--config <path.json>]
//! chainsearch head   --rpc <url>
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr (`RUST_LOG` controls the level).

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chainsearch_core::{EventsRequest, SearchConfig};
use chainsearch_evm::{Erc20Contract, SearchBuilder};
use chainsearch_rpc::{HttpClientConfig, HttpRpcClient, RpcTransport};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "chainsearch",
    about = "Adaptive batched event-log search for EVM contracts",
    long_about = "
Fetches the complete event history of a contract over a block range.
The range is split into batches fetched concurrently; any batch the node
refuses as too large is halved until the node answers.

ENVIRONMENT VARIABLES:
  CHAINSEARCH_RPC   Default JSON-RPC endpoint URL
  RUST_LOG          Log filter (default: info)
",
    version
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all events of a contract and print them as JSON
    Events(EventsArgs),

    /// Print the node's current block number
    Head {
        #[arg(long, env = "CHAINSEARCH_RPC")]
        rpc: String,
    },
}

#[derive(Args)]
struct EventsArgs {
    /// JSON-RPC endpoint URL
    #[arg(long, env = "CHAINSEARCH_RPC")]
    rpc: String,
    /// Contract address
    #[arg(long)]
    address: String,
    /// Path to the contract ABI (bare array or compiler artifact)
    #[arg(long, conflicts_with = "erc20", required_unless_present = "erc20")]
    abi: Option<PathBuf>,
    /// Use the bundled ERC-20 ABI
    #[arg(long)]
    erc20: bool,
    /// First block (default: earliest)
    #[arg(long, conflicts_with = "blocks_ago", allow_negative_numbers = true)]
    from_block: Option<i64>,
    /// Start this many blocks before the head
    #[arg(long)]
    blocks_ago: Option<u64>,
    /// Last block (default: head)
    #[arg(long)]
    to_block: Option<u64>,
    /// Sub-ranges per event
    #[arg(long)]
    batches: Option<usize>,
    /// Concurrent node queries
    #[arg(long)]
    workers: Option<usize>,
    /// JSON file with `search` and `http` settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

/// Optional settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    search: SearchConfig,
    http: HttpClientConfig,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Commands::Events(args) => cmd_events(args).await,
        Commands::Head { rpc } => cmd_head(&rpc).await,
    }
}

async fn cmd_events(args: EventsArgs) -> Result<()> {
    let file_config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<FileConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let mut builder = SearchBuilder::new()
        .rpc_url(&args.rpc)
        .http_config(file_config.http)
        .config(file_config.search)
        .address(&args.address);
    if let Some(n) = args.batches {
        builder = builder.batches(n);
    }
    if let Some(n) = args.workers {
        builder = builder.workers(n);
    }
    builder = match (&args.abi, args.erc20) {
        (Some(path), _) => {
            let abi = std::fs::read_to_string(path)
                .with_context(|| format!("reading ABI {}", path.display()))?;
            builder.abi(abi)
        }
        (None, true) => builder.contract_model(Erc20Contract::new()),
        (None, false) => bail!("either --abi or --erc20 is required"),
    };
    let search = builder.build().context("building search")?;

    let mut request = EventsRequest::new();
    request.from_block = args.from_block;
    request.to_block = args.to_block;
    request.n_blocks_ago = args.blocks_ago;

    let started = std::time::Instant::now();
    let out = search.get_events(request).await?;
    tracing::info!(
        events = out.len(),
        rows = out.values().map(|d| d.len()).sum::<usize>(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "search finished"
    );

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut handle, &out)?;
    } else {
        serde_json::to_writer(&mut handle, &out)?;
    }
    writeln!(handle)?;
    Ok(())
}

async fn cmd_head(rpc: &str) -> Result<()> {
    let client = HttpRpcClient::default_for(rpc)?;
    let head: String = client.call(1, "eth_blockNumber", vec![]).await?;
    let number = chainsearch_evm::parse_hex_u64(&head)?;
    println!("{number}");
    Ok(())
}
