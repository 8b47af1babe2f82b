//! netsyncd: the netsync daemon.
//!
//! Keeps the frontend, backend, stats and proxy containers of one
//! deployment in line with a single database row:
//! - Initial reconciliation against the current row
//! - Realtime subscription to row changes, with heartbeat
//! - Handler pipeline writing the environment store
//! - Restart worker recreating only the affected containers
//!
//! # Usage
//!
//! ```text
//! netsyncd run --config /etc/netsync/netsync.toml
//! netsyncd check --config /etc/netsync/netsync.toml
//! ```

mod daemon;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use netsync_core::NetsyncConfig;

#[derive(Parser)]
#[command(name = "netsyncd", about = "netsync daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile, subscribe and apply changes until stopped.
    Run {
        /// Path to netsync.toml.
        #[arg(long, short)]
        config: PathBuf,

        /// Log output format.
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },
    /// Validate the configuration and the environment store, then exit.
    Check {
        /// Path to netsync.toml.
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,netsync=debug,netsyncd=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: &Path) -> anyhow::Result<NetsyncConfig> {
    NetsyncConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, log_format } => {
            init_tracing(log_format);
            let config = load_config(&config)?;
            daemon::run(config).await
        }
        Command::Check { config } => {
            init_tracing(LogFormat::Text);
            let config = load_config(&config)?;
            daemon::check(&config)
        }
    }
}
