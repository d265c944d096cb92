//! Autopress CLI: unattended blog publishing.
//!
//! Plans topics, generates articles with Claude, picks a category and a
//! cover image, and publishes to WordPress on a per-site schedule.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
