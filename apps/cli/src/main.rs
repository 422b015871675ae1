//! landingsync CLI: generate location landing pages and publish them.
//!
//! Runs can be started directly (`generate`), from a saved CRM webhook
//! payload (`webhook`), or by the HTTP trigger server (`serve`).

mod commands;
mod runner;
mod server;

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
