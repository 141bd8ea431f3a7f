//! SupportFlow CLI: draft reviewed support replies from the terminal.
//!
//! Runs the ticket pipeline once per invocation and inspects the knowledge
//! base behind it.

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
