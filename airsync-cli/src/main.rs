//! airsync: reconcile an OurAirports dataset into the airport registry.
//!
//! # Usage
//!
//! ```text
//! airsync init [--countries <yaml>] [--airports <yaml>] [--flights <yaml>]
//! airsync sync <airports.csv> [--live-run] [--skip-invalid] [--json]
//! airsync diff <airports.csv> [--skip-invalid]
//! airsync status [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "airsync",
    version,
    about = "Reconcile OurAirports data into the airport/flight registry",
    long_about = None,
)]
struct Cli {
    /// Log every decision and write (same as RUST_LOG=info).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the registry, optionally seeding tables from YAML files.
    Init(InitArgs),

    /// Reconcile a dataset against the registry (dry run unless --live-run).
    Sync(SyncArgs),

    /// Show a unified diff of what sync would change.
    Diff(DiffArgs),

    /// Show registry size and the outcome of the last run.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}
