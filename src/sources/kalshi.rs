use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::KALSHI_API_BASE;
use crate::config::WatchConfig;
use crate::types::Market;

/// Page size when walking the full market book.
const PAGE_LIMIT: u32 = 1000;

/// How many pages of the market book to scan for stragglers.
const MAX_PAGES: u32 = 5;

/// A Kalshi market (trade-api/v2 shape). Prices are in cents (0-100).
#[derive(Debug, Clone, Deserialize)]
pub struct KalshiMarket {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub yes_bid: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KalshiEvent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub markets: Option<Vec<KalshiMarket>>,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    market: Option<KalshiMarket>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<KalshiEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MarketsPage {
    #[serde(default)]
    pub markets: Vec<KalshiMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Fetch a single market by ticker.
pub async fn fetch_market(client: &Client, ticker: &str) -> Result<Option<KalshiMarket>> {
    let url = format!("{KALSHI_API_BASE}/markets/{ticker}");
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("Kalshi request for {ticker} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Kalshi API error for {ticker}: {status}");
    }
    let body: MarketResponse = response
        .json()
        .await
        .with_context(|| format!("invalid Kalshi market for {ticker}"))?;
    Ok(body.market)
}

/// Fetch open events (with their nested markets).
pub async fn fetch_open_events(client: &Client, limit: u32) -> Result<Vec<KalshiEvent>> {
    let url = format!("{KALSHI_API_BASE}/events?limit={limit}&status=open");
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Kalshi events request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Kalshi events API error: {status}");
    }
    let body: EventsResponse = response.json().await.context("invalid Kalshi events list")?;
    Ok(body.events)
}

/// Fetch one page of the full market book.
pub async fn fetch_markets_page(client: &Client, cursor: Option<&str>) -> Result<MarketsPage> {
    let url = match cursor {
        Some(c) => format!("{KALSHI_API_BASE}/markets?limit={PAGE_LIMIT}&cursor={c}"),
        None => format!("{KALSHI_API_BASE}/markets?limit={PAGE_LIMIT}"),
    };
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Kalshi markets request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Kalshi markets API error: {status}");
    }
    response.json().await.context("invalid Kalshi markets page")
}

/// Collect watched Kalshi markets in three passes: curated tickers, a sweep
/// of open events matching the watch keywords, and a bounded walk of the
/// full market book for ticker prefixes the event sweep misses. Dedups by
/// ticker across all passes; every failure skips and continues.
pub async fn gather_markets(client: &Client, watch: &WatchConfig) -> Vec<Market> {
    let mut found: Vec<KalshiMarket> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for ticker in &watch.kalshi_tickers {
        match fetch_market(client, ticker).await {
            Ok(Some(market)) if !market.ticker.is_empty() => {
                if seen.insert(market.ticker.clone()) {
                    found.push(market);
                }
            }
            Ok(_) => debug!("Kalshi ticker {ticker} returned no market"),
            Err(e) => warn!("Failed to fetch Kalshi ticker {ticker}: {e:#}"),
        }
    }

    match fetch_open_events(client, 200).await {
        Ok(events) => {
            for event in events {
                if !event_matches(&event, &watch.keywords) {
                    continue;
                }
                for market in event.markets.unwrap_or_default() {
                    if !market.ticker.is_empty() && seen.insert(market.ticker.clone()) {
                        found.push(market);
                    }
                }
            }
        }
        Err(e) => warn!("Kalshi events sweep failed: {e:#}"),
    }

    let mut cursor: Option<String> = None;
    for _page in 0..MAX_PAGES {
        let page = match fetch_markets_page(client, cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Kalshi market-book scan stopped: {e:#}");
                break;
            }
        };
        let empty = page.markets.is_empty();
        for market in page.markets {
            if market.ticker.is_empty() || seen.contains(&market.ticker) {
                continue;
            }
            if market_matches(&market, &watch.kalshi_ticker_prefixes, &watch.keywords) {
                seen.insert(market.ticker.clone());
                found.push(market);
            }
        }
        cursor = page.cursor;
        if cursor.is_none() || empty {
            break;
        }
    }

    let mut markets: Vec<Market> = found.iter().map(normalize_market).collect();
    super::polymarket::sort_by_volume(&mut markets);
    markets
}

/// An event is relevant when its title or category mentions a watch keyword.
pub fn event_matches(event: &KalshiEvent, keywords: &[String]) -> bool {
    let haystack = format!(
        "{} {}",
        event.title.as_deref().unwrap_or(""),
        event.category.as_deref().unwrap_or("")
    )
    .to_lowercase();
    keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

/// A market is relevant when its ticker carries a watched prefix or its
/// title/subtitle mentions a watch keyword.
pub fn market_matches(market: &KalshiMarket, prefixes: &[String], keywords: &[String]) -> bool {
    let ticker = market.ticker.to_uppercase();
    if prefixes.iter().any(|p| ticker.starts_with(&p.to_uppercase())) {
        return true;
    }
    let haystack = format!(
        "{} {}",
        market.title.as_deref().unwrap_or(""),
        market.subtitle.as_deref().unwrap_or("")
    )
    .to_lowercase();
    keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

/// Reshape into the dashboard schema, converting cent prices (0-100) to
/// decimals so both market feeds read alike. yes_bid is preferred (best
/// bid), falling back to the last trade.
pub fn normalize_market(market: &KalshiMarket) -> Market {
    let yes_price = market
        .yes_bid
        .or(market.last_price)
        .map(|cents| cents / 100.0);
    let no_price = yes_price.map(|yes| 1.0 - yes);
    let status = market.status.as_deref().unwrap_or("");

    Market {
        id: market.ticker.clone(),
        title: market
            .title
            .clone()
            .unwrap_or_else(|| "Unknown Market".to_string()),
        slug: market.ticker.clone(),
        yes_price,
        no_price,
        volume: market.volume.unwrap_or(0.0),
        liquidity: market.open_interest.unwrap_or(0.0),
        end_date: market.close_time.clone(),
        active: status == "active" || status == "open",
        url: format!("https://kalshi.com/markets/{}", market.ticker),
        source: "kalshi".to_string(),
    }
}
