//! Morpion server binary.
//!
//! Usage: `morpion_server [PORT] [--config <PATH>]`

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use morpion_server::GameServer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,morpion_server=debug,morpion_board=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let server = match GameServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to start server");
            return Err(e.into());
        }
    };
    info!(address = %server.local_addr()?, "Morpion server listening");

    server.run().await?;
    Ok(())
}
