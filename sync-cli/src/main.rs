//! # offline-sync
//!
//! Operator CLI for an offline-sync store.
//!
//! ## Commands
//!
//! - `status`: Show queue and storage status
//! - `queue`: List pending operations in dispatch order
//! - `enqueue`: Queue a new operation
//! - `clear`: Drop every pending operation
//! - `cleanup`: Evict expired entries
//! - `export` / `import`: Dump and restore store contents
//! - `simulate`: Drain the queue against a scripted endpoint
//!
//! ## Example
//!
//! ```bash
//! # Queue a write while offline
//! offline-sync enqueue create /teachers --payload '{"name": "Ada"}' --priority high
//!
//! # Inspect what is waiting
//! offline-sync queue
//!
//! # Drain it, failing the first two calls
//! offline-sync simulate --fail 2 --drain
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sync_client::MockInvoker;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{clear, cleanup, enqueue, export, import, queue, simulate, status};
use config::Config;

/// Operator CLI for an offline-sync store.
#[derive(Parser, Debug)]
#[command(name = "offline-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the store database and config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/offline-sync.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show queue and storage status
    Status,

    /// List pending operations in dispatch order
    Queue {
        /// Print the queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue a new operation
    Enqueue {
        /// Operation kind: create, update or delete
        kind: String,

        /// Remote endpoint, e.g. /teachers/42
        endpoint: String,

        /// JSON request body
        #[arg(long)]
        payload: Option<String>,

        /// Dispatch priority: high, medium or low
        #[arg(long, short, default_value = "medium")]
        priority: String,
    },

    /// Drop every pending operation
    Clear,

    /// Evict expired entries
    Cleanup,

    /// Dump every live entry as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Load entries from an export dump
    Import {
        /// Dump file produced by `export`
        file: PathBuf,

        /// Keep entries that already hold a live value
        #[arg(long)]
        fill_missing: bool,
    },

    /// Drain the queue against a scripted in-process endpoint
    Simulate {
        /// Fail this many calls with a 503 before succeeding
        #[arg(long, default_value = "0")]
        fail: usize,

        /// Hold every call open for this many milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,

        /// Keep going through retries until the queue is empty
        #[arg(long)]
        drain: bool,

        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let config = Config::resolve(cli.config.as_deref(), &data_dir)?;

    let invoker = MockInvoker::new();
    let engine = commands::open_engine(&data_dir, &config, Arc::new(invoker.clone()))?;

    match cli.command {
        Commands::Status => status::run(&engine)?,
        Commands::Queue { json } => queue::run(&engine, json)?,
        Commands::Enqueue {
            kind,
            endpoint,
            payload,
            priority,
        } => {
            enqueue::run(&engine, &kind, &endpoint, payload.as_deref(), &priority)?;
        }
        Commands::Clear => {
            clear::run(&engine)?;
        }
        Commands::Cleanup => {
            cleanup::run(&engine)?;
        }
        Commands::Export { output } => export::run(&engine, output.as_deref())?,
        Commands::Import { file, fill_missing } => {
            import::run(&engine, &file, fill_missing)?;
        }
        Commands::Simulate {
            fail,
            latency_ms,
            drain,
            timeout_secs,
        } => {
            engine.start_cleanup(config.cleanup.clone());
            let options = simulate::SimulateOptions {
                fail,
                latency: latency_ms.map(Duration::from_millis),
                drain,
                timeout: Duration::from_secs(timeout_secs),
            };
            simulate::run(&engine, &invoker, options).await?;
        }
    }

    Ok(())
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_tracing(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        if let Ok(directive) = level.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for offline-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "offline-sync", "offline-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
