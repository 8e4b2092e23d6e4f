use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::GAMMA_API_BASE;
use crate::config::WatchConfig;
use crate::types::Market;

/// Page size for the open-events sweep that catches markets missing from the
/// curated slug list.
const SWEEP_LIMIT: u32 = 100;

/// A Gamma API event (only the fields the dashboard reads). Numeric fields
/// arrive as numbers or numeric strings depending on the endpoint, so they
/// stay loose here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaEvent {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default)]
    pub liquidity: Option<Value>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub outcome_prices: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
}

impl GammaEvent {
    /// Stable id as a string; events without an id are unusable.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Fetch one event by its URL slug.
pub async fn fetch_event_by_slug(client: &Client, slug: &str) -> Result<GammaEvent> {
    let url = format!("{GAMMA_API_BASE}/events/slug/{slug}");
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("Gamma request for slug {slug} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Gamma API error for slug {slug}: {status}");
    }
    response
        .json()
        .await
        .with_context(|| format!("invalid Gamma event for slug {slug}"))
}

/// Fetch a page of open events, newest first.
pub async fn fetch_open_events(client: &Client, limit: u32) -> Result<Vec<GammaEvent>> {
    let url = format!("{GAMMA_API_BASE}/events?closed=false&limit={limit}&ascending=false");
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Gamma events request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Gamma events API error: {status}");
    }
    response.json().await.context("invalid Gamma events list")
}

/// Collect every watched market: curated slugs first, then a keyword sweep
/// of open events for anything the list missed. Per-slug failures are
/// skipped; the sweep failing only costs the extras.
pub async fn gather_markets(client: &Client, watch: &WatchConfig) -> Vec<Market> {
    let mut events: Vec<GammaEvent> = Vec::new();

    for slug in &watch.polymarket_slugs {
        match fetch_event_by_slug(client, slug).await {
            Ok(event) if event.id_string().is_some() => events.push(event),
            Ok(_) => debug!("Gamma event for slug {slug} has no id, skipping"),
            Err(e) => warn!("Failed to fetch Gamma slug {slug}: {e:#}"),
        }
    }

    match fetch_open_events(client, SWEEP_LIMIT).await {
        Ok(swept) => {
            for event in filter_relevant(swept, &watch.keywords) {
                let Some(id) = event.id_string() else { continue };
                if !events.iter().any(|e| e.id_string().as_deref() == Some(&id)) {
                    events.push(event);
                }
            }
        }
        Err(e) => warn!("Gamma open-events sweep failed: {e:#}"),
    }

    let mut markets: Vec<Market> = events.iter().filter_map(normalize_event).collect();
    sort_by_volume(&mut markets);
    markets
}

/// Events whose title or slug mentions any watch keyword.
pub fn filter_relevant(events: Vec<GammaEvent>, keywords: &[String]) -> Vec<GammaEvent> {
    events
        .into_iter()
        .filter(|event| {
            let title = event.title.as_deref().unwrap_or("").to_lowercase();
            let slug = event.slug.as_deref().unwrap_or("").to_lowercase();
            keywords
                .iter()
                .any(|kw| title.contains(&kw.to_lowercase()) || slug.contains(&kw.to_lowercase()))
        })
        .collect()
}

/// Reshape a Gamma event into the dashboard market schema. Prices come from
/// the first market's `outcomePrices`, which is usually a JSON-encoded
/// string array but sometimes a plain array.
pub fn normalize_event(event: &GammaEvent) -> Option<Market> {
    let id = event.id_string()?;
    let slug = event.slug.clone().unwrap_or_default();
    let main_market = event.markets.first();

    let (yes_price, no_price) = main_market
        .and_then(|m| m.outcome_prices.as_ref())
        .map(parse_outcome_prices)
        .unwrap_or((None, None));

    let volume = event
        .volume
        .as_ref()
        .and_then(value_to_f64)
        .or_else(|| main_market.and_then(|m| m.volume.as_ref()).and_then(value_to_f64))
        .unwrap_or(0.0);

    Some(Market {
        id,
        title: event
            .title
            .clone()
            .unwrap_or_else(|| "Unknown Market".to_string()),
        url: format!("https://polymarket.com/event/{slug}"),
        slug,
        yes_price,
        no_price,
        volume,
        liquidity: event.liquidity.as_ref().and_then(value_to_f64).unwrap_or(0.0),
        end_date: event.end_date.clone(),
        active: event.active != Some(false),
        source: "polymarket".to_string(),
    })
}

/// (yes, no) prices out of an `outcomePrices` value in either encoding.
pub fn parse_outcome_prices(raw: &Value) -> (Option<f64>, Option<f64>) {
    let parsed: Value = match raw {
        Value::String(s) => match serde_json::from_str(s) {
            Ok(v) => v,
            Err(_) => return (None, None),
        },
        other => other.clone(),
    };
    let Value::Array(prices) = parsed else {
        return (None, None);
    };
    let yes = prices.first().and_then(value_to_f64);
    let no = prices.get(1).and_then(value_to_f64);
    (yes, no)
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Most-traded first.
pub fn sort_by_volume(markets: &mut [Market]) {
    markets.sort_by(|a, b| {
        b.volume
            .partial_cmp(&a.volume)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> GammaEvent {
        serde_json::from_value(value).expect("valid test event JSON")
    }

    #[test]
    fn outcome_prices_json_string_form() {
        let (yes, no) = parse_outcome_prices(&json!("[\"0.75\", \"0.25\"]"));
        assert_eq!(yes, Some(0.75));
        assert_eq!(no, Some(0.25));
    }

    #[test]
    fn outcome_prices_array_form() {
        let (yes, no) = parse_outcome_prices(&json!(["0.6", 0.4]));
        assert_eq!(yes, Some(0.6));
        assert_eq!(no, Some(0.4));
    }

    #[test]
    fn outcome_prices_garbage() {
        assert_eq!(parse_outcome_prices(&json!("not json")), (None, None));
        assert_eq!(parse_outcome_prices(&json!({"a": 1})), (None, None));
    }

    #[test]
    fn normalize_full_event() {
        let event = event(json!({
            "id": "903193",
            "title": "Will the rent freeze pass?",
            "slug": "rent-freeze-2027",
            "volume": "125000.5",
            "liquidity": 4000,
            "endDate": "2027-01-01T00:00:00Z",
            "markets": [{"outcomePrices": "[\"0.32\", \"0.68\"]", "volume": 100}]
        }));
        let market = normalize_event(&event).unwrap();
        assert_eq!(market.id, "903193");
        assert_eq!(market.yes_price, Some(0.32));
        assert_eq!(market.no_price, Some(0.68));
        assert!((market.volume - 125_000.5).abs() < 1e-9);
        assert!(market.active);
        assert_eq!(market.url, "https://polymarket.com/event/rent-freeze-2027");
        assert_eq!(market.source, "polymarket");
    }

    #[test]
    fn normalize_falls_back_to_market_volume() {
        let event = event(json!({
            "id": 42,
            "title": "T",
            "slug": "t",
            "markets": [{"volume": "999"}]
        }));
        let market = normalize_event(&event).unwrap();
        assert_eq!(market.id, "42");
        assert_eq!(market.volume, 999.0);
        assert_eq!(market.yes_price, None);
    }

    #[test]
    fn normalize_requires_id() {
        let event = event(json!({"title": "No id", "slug": "x"}));
        assert!(normalize_event(&event).is_none());
    }

    #[test]
    fn inactive_flag_respected() {
        let event = event(json!({"id": "1", "slug": "s", "active": false}));
        assert!(!normalize_event(&event).unwrap().active);
    }

    #[test]
    fn keyword_filter_matches_title_or_slug() {
        let events = vec![
            event(json!({"id": "1", "title": "Mamdani rent freeze", "slug": "a"})),
            event(json!({"id": "2", "title": "Unrelated", "slug": "mamdani-grocery-store"})),
            event(json!({"id": "3", "title": "Fed rate cut", "slug": "fed"})),
        ];
        let keywords = vec!["mamdani".to_string(), "nyc mayor".to_string()];
        let kept = filter_relevant(events, &keywords);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn volume_sort_is_descending() {
        let mut markets = vec![
            Market { id: "a".into(), volume: 10.0, ..Default::default() },
            Market { id: "b".into(), volume: 500.0, ..Default::default() },
            Market { id: "c".into(), volume: 99.0, ..Default::default() },
        ];
        sort_by_volume(&mut markets);
        let ids: Vec<&str> = markets.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }
}
