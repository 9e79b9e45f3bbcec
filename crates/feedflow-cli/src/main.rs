//! feedflow CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedflow_cli::{Cli, Commands, Context, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(&cli).await?;

    match cli.command {
        Commands::Sync => cmd::sync::sync(&ctx).await,
        Commands::Watch { interval } => cmd::watch::watch(&ctx, interval).await,
        Commands::Plan => cmd::plan::plan(&ctx).await,
        Commands::Status => cmd::status::status(&ctx).await,
    }
}
