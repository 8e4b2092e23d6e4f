use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use civicdash::config::{AppConfig, Secrets};
use civicdash::server::{AppState, serve};

/// Civic dashboard API server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, default_value = civicdash::config::CONFIG_PATH)]
    config: PathBuf,

    /// Override the bind address from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load_or_default(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let secrets = Secrets::from_env();

    let state = Arc::new(AppState::new(config, secrets)?);
    serve(state).await
}
