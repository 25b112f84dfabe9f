//! abrlab CLI - Command-line interface
//!
//! Runs simulated adaptive-bitrate sessions and prints their metrics,
//! segment timelines and side-by-side comparisons.

mod commands;

use std::path::PathBuf;

use abrlab_core::tracing_setup::{CliLogLevel, init_tracing};
use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "abrlab")]
#[command(about = "Adaptive-bitrate playback lab")]
#[command(version)]
struct Cli {
    /// Console log level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for a full trace of the run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let trace_file = init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("cannot open trace file")?;
    if let Some(path) = trace_file {
        tracing::info!("Writing trace to {}", path.display());
    }

    if let Err(e) = commands::handle_command(cli.command).await {
        if !e.is_user_error() {
            tracing::error!("{}", e);
        }
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}
