//! Binary crate for the `agrismart` command-line tool.
//!
//! Wires the core services to clap subcommands, inquire prompts and a
//! terminal renderer for weather reports.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod output;

const DEFAULT_LOG_FILTER: &str = "agrismart=info,agrismart_core=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

/// Logs go to stderr so that stdout stays clean for reports and `--json`.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
