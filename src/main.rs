mod cache;
mod cli;
mod config;
mod http;
mod merge;
mod models;
mod services;
mod session;
mod storage;

use clap::Parser;
use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    cli::run_cli(cli, config).await
}
