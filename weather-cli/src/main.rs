//! Binary crate for the `weather-collector` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Log sink setup
//! - Interactive configuration
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
