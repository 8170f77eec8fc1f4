//! Mothlight CLI.
//!
//! One command for now: run the decoy server. The decoy serves an endless,
//! harmless, link-rich page to whatever crawls it; qualifying client
//! signatures are tallied and persisted on a fixed schedule into a
//! date-partitioned CSV ledger.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod server;

#[derive(Parser)]
#[command(name = "mothlight")]
#[command(
    author,
    version,
    about = "Decoy web service with crawler-signature telemetry"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decoy server.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Listen address (use `127.0.0.1:0` to auto-pick a free port).
    ///
    /// Falls back to `MOTHLIGHT_LISTEN`, then `0.0.0.0:8070`.
    #[arg(long)]
    listen: Option<String>,

    /// Authority the generated decoy links point back into (the links are
    /// `http://<name1-name2-name3>.<domain>/`).
    ///
    /// Falls back to `MOTHLIGHT_DOMAIN`, then the listen address.
    #[arg(long)]
    domain: Option<String>,

    /// Root directory of the telemetry ledger
    /// (`<root>/<year>/<monthName>/<day>.csv`).
    ///
    /// Falls back to `MOTHLIGHT_LEDGER_ROOT`, then `./logs/mothlight`.
    /// An empty value disables persistence entirely: observations are still
    /// accepted but no flush task runs.
    #[arg(long)]
    ledger_root: Option<String>,

    /// Flush scheduler period in seconds.
    #[arg(long, default_value_t = 10)]
    flush_interval_secs: u64,

    /// If set, write a small JSON file once the server is listening.
    ///
    /// Useful for scripts/tests to learn the chosen port when `--listen ...:0`.
    #[arg(long)]
    ready_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => server::run(args),
    }
}
