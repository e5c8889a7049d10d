//! wintally: a Slack slash-command service that records personal wins in a
//! JSON file and DMs each user their summary on demand.

mod broadcast;
mod config;
mod notify;
mod server;
mod signature;
mod store;
mod summary;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "wintally",
    version,
    about = "Slack wins logger: signed slash-command intake, JSON file store, DM summaries"
)]
struct Args {
    /// Config file path (default: ./wintally.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
    /// Win log file (overrides the config file).
    #[arg(long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wintally=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(store) = args.store {
        config.store_path = store;
    }

    server::run(config).await
}
