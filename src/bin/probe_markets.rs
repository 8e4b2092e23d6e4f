//! Fetch both market feeds with the configured watch lists and print each
//! normalized market as a JSON line. Handy for checking what the dashboard
//! would show without running the server.

use std::path::Path;

use anyhow::Result;
use futures_util::future::join;
use tracing_subscriber::EnvFilter;

use civicdash::config::{AppConfig, CONFIG_PATH};
use civicdash::sources::{kalshi, polymarket};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load_or_default(Path::new(CONFIG_PATH))?;
    let client = reqwest::Client::builder()
        .user_agent(civicdash::USER_AGENT)
        .build()?;

    let (poly, kalshi) = join(
        polymarket::gather_markets(&client, &config.watch),
        kalshi::gather_markets(&client, &config.watch),
    )
    .await;

    for market in poly.iter().chain(kalshi.iter()) {
        println!("{}", serde_json::to_string(market)?);
    }
    eprintln!(
        "{} polymarket + {} kalshi markets",
        poly.len(),
        kalshi.len()
    );
    Ok(())
}
