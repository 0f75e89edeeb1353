//! ferry: a polling data-mover between storage backends.
//!
//! Configuration comes entirely from environment variables (see
//! ferry-core's config module). Exit status is non-zero on any unhandled
//! cycle failure, so a process supervisor can reschedule.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ferry_cli::init_tracing;
use ferry_core::Config;
use ferry_worker::Orchestrator;

#[derive(Parser)]
#[command(name = "ferry", about = "Move files between storage backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single transfer cycle in the configured mode
    Run,
    /// Run transfer cycles on the configured interval until stopped
    Watch,
    /// Publish a transfer event for every file at the source
    Publish,
    /// Consume transfer events and move one file per message
    Consume,
}

/// Drive cycles on a fixed interval. Sequential awaits guarantee at most
/// one cycle runs at a time; a failed cycle exits the process so the
/// supervisor reschedules from a fresh listing.
async fn watch(config: &Config, orchestrator: &Orchestrator<'_>) -> anyhow::Result<()> {
    let period = Duration::from_secs(config.transfer.poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval_secs = period.as_secs(), "Watching for files");

    loop {
        interval.tick().await;
        orchestrator.run().await?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let orchestrator = Orchestrator::new(&config);

    match cli.command {
        Commands::Run => orchestrator.run().await,
        Commands::Watch => watch(&config, &orchestrator).await,
        Commands::Publish => orchestrator.run_publish().await,
        Commands::Consume => orchestrator.run_consume().await,
    }
}
