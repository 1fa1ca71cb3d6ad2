//! chaintap — zero-configuration indexer for smart-contract event logs.

mod commands;
mod config_loader;
mod logging;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use commands::backfill::ToBlock;

#[derive(Parser)]
#[command(name = "chaintap")]
#[command(about = "Zero-configuration indexer for EVM smart-contract event logs")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true, default_value = "./chaintap.yaml")]
    config: PathBuf,

    /// Raise the default log level from info to debug.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Long-running polling of every configured contract.
    Watch,
    /// Index a fixed block range once per contract, then exit.
    Backfill {
        #[arg(long = "from-block")]
        from_block: u64,
        #[arg(long = "to-block")]
        to_block: ToBlock,
    },
    /// Print per-contract sync status. Never mutates.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            tracing::error!(error = %e, "chaintap exited with an error");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config_loader::load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let components = wiring::build(&config).await.context("wiring up components")?;

    match cli.command {
        Command::Watch => commands::watch::run(config, components).await?,
        Command::Backfill { from_block, to_block } => {
            commands::backfill::run(config, components, from_block, to_block).await?
        }
        Command::Status => commands::status::run(config, components).await?,
    }
    Ok(())
}

/// Maps a top-level error to the process exit code per SPEC_FULL's CLI
/// surface: 1 configuration error, 2 RPC error, 3 storage error. ABI and
/// FileSystem errors surfaced here always trace back to misconfiguration
/// (bad manual path, unsupported chain), so they share the config code.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(chaintap_error) = cause.downcast_ref::<chaintap_core::ChaintapError>() {
            return chaintap_error.exit_code() as u8;
        }
    }
    1
}
