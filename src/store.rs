//! Supabase (PostgREST) persistence: market price history for breaking-alert
//! deltas, a breaking-alert dedup log, and the notable-alert archive the
//! weekly digest drains.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::types::{AlertKind, Market, NotableAlert};

const MARKET_HISTORY_TABLE: &str = "market_history";
const BREAKING_SENT_TABLE: &str = "breaking_alerts_sent";
const NOTABLE_ALERTS_TABLE: &str = "notable_alerts";

#[derive(Debug, Clone, Serialize)]
struct MarketSnapshot<'a> {
    market_id: &'a str,
    market_title: &'a str,
    source: &'a str,
    yes_price: Option<f64>,
    volume: f64,
    liquidity: f64,
}

/// A notable alert as stored, with its row id so the digest can mark it
/// sent afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredAlert {
    pub id: i64,
    #[serde(rename = "alert_type")]
    pub kind: AlertKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl StoredAlert {
    pub fn to_alert(&self) -> NotableAlert {
        NotableAlert {
            kind: self.kind,
            title: self.title.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            source: self.source.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    http: Client,
    base_url: String,
    api_key: String,
}

impl Store {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        Url::parse(&format!("{}/rest/v1/{table}", self.base_url))
            .with_context(|| format!("invalid store URL for table {table}"))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Insert one price snapshot per market.
    pub async fn save_snapshots(&self, markets: &[Market]) -> Result<usize> {
        if markets.is_empty() {
            return Ok(0);
        }
        let rows: Vec<MarketSnapshot<'_>> = markets
            .iter()
            .map(|m| MarketSnapshot {
                market_id: &m.id,
                market_title: &m.title,
                source: &m.source,
                yes_price: m.yes_price,
                volume: m.volume,
                liquidity: m.liquidity,
            })
            .collect();

        let response = self
            .authed(self.http.post(self.table_url(MARKET_HISTORY_TABLE)?))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .context("snapshot insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("snapshot insert failed: {status}");
        }
        debug!("Saved {} market snapshots", rows.len());
        Ok(rows.len())
    }

    /// Most recent recorded yes price for a market at or before `cutoff`.
    pub async fn price_at_or_before(
        &self,
        market_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let mut url = self.table_url(MARKET_HISTORY_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "yes_price")
            .append_pair("market_id", &format!("eq.{market_id}"))
            .append_pair("recorded_at", &format!("lte.{}", cutoff.to_rfc3339()))
            .append_pair("order", "recorded_at.desc")
            .append_pair("limit", "1");

        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .context("price history request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("price history query failed: {status}");
        }
        let rows: Vec<Value> = response
            .json()
            .await
            .context("invalid price history rows")?;
        Ok(rows
            .first()
            .and_then(|row| row.get("yes_price"))
            .and_then(Value::as_f64))
    }

    /// Whether a breaking alert for this market was already sent since
    /// `since` (dedup window).
    pub async fn alert_sent_since(
        &self,
        market_id: &str,
        alert_type: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let mut url = self.table_url(BREAKING_SENT_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("market_id", &format!("eq.{market_id}"))
            .append_pair("alert_type", &format!("eq.{alert_type}"))
            .append_pair("sent_at", &format!("gte.{}", since.to_rfc3339()))
            .append_pair("limit", "1");

        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .context("alert dedup request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("alert dedup query failed: {status}");
        }
        let rows: Vec<Value> = response.json().await.context("invalid dedup rows")?;
        Ok(!rows.is_empty())
    }

    /// Log a sent breaking alert for future dedup.
    pub async fn record_alert_sent(&self, market_id: &str, alert_type: &str) -> Result<()> {
        let response = self
            .authed(self.http.post(self.table_url(BREAKING_SENT_TABLE)?))
            .header("Prefer", "return=minimal")
            .json(&json!({"market_id": market_id, "alert_type": alert_type}))
            .send()
            .await
            .context("alert log request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("alert log insert failed: {status}");
        }
        Ok(())
    }

    /// Archive freshly generated notable alerts, not yet part of any digest.
    pub async fn insert_notable_alerts(&self, alerts: &[NotableAlert]) -> Result<usize> {
        if alerts.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Value> = alerts
            .iter()
            .map(|alert| {
                json!({
                    "alert_type": alert.kind,
                    "title": alert.title,
                    "description": alert.description,
                    "url": alert.url,
                    "source": alert.source,
                    "sent_in_digest": false
                })
            })
            .collect();

        let response = self
            .authed(self.http.post(self.table_url(NOTABLE_ALERTS_TABLE)?))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .context("notable alert insert request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("notable alert insert failed: {status}");
        }
        Ok(rows.len())
    }

    /// Notable alerts created inside the window that no digest has claimed.
    pub async fn unsent_alerts_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredAlert>> {
        let mut url = self.table_url(NOTABLE_ALERTS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("created_at", &format!("gte.{}", start.to_rfc3339()))
            .append_pair("created_at", &format!("lte.{}", end.to_rfc3339()))
            .append_pair("sent_in_digest", "eq.false")
            .append_pair("order", "created_at.asc");

        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .context("unsent alerts request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("unsent alerts query failed: {status}");
        }
        response.json().await.context("invalid unsent alert rows")
    }

    /// Mark digest alerts as sent so the next digest skips them.
    pub async fn mark_alerts_sent(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut url = self.table_url(NOTABLE_ALERTS_TABLE)?;
        url.query_pairs_mut().append_pair("id", &in_filter(ids));

        let response = self
            .authed(self.http.patch(url))
            .header("Prefer", "return=minimal")
            .json(&json!({"sent_in_digest": true}))
            .send()
            .await
            .context("mark-sent request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("mark-sent update failed: {status}");
        }
        Ok(())
    }
}

/// PostgREST `in` filter: `in.(1,2,3)`.
fn in_filter(ids: &[i64]) -> String {
    let list = ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({list})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_filter_format() {
        assert_eq!(in_filter(&[7]), "in.(7)");
        assert_eq!(in_filter(&[1, 2, 30]), "in.(1,2,30)");
    }

    #[test]
    fn snapshot_row_shape() {
        let snapshot = MarketSnapshot {
            market_id: "903193",
            market_title: "Rent freeze?",
            source: "polymarket",
            yes_price: Some(0.42),
            volume: 1000.0,
            liquidity: 50.0,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({
                "market_id": "903193",
                "market_title": "Rent freeze?",
                "source": "polymarket",
                "yes_price": 0.42,
                "volume": 1000.0,
                "liquidity": 50.0
            })
        );
    }

    #[test]
    fn stored_alert_round_trip() {
        let row = json!({
            "id": 12,
            "alert_type": "MOMENTUM",
            "title": "Grocery pilot gains",
            "description": "Market up 9 points in a week",
            "url": null,
            "source": "polymarket"
        });
        let stored: StoredAlert = serde_json::from_value(row).unwrap();
        assert_eq!(stored.id, 12);
        assert_eq!(stored.kind, AlertKind::Momentum);
        let alert = stored.to_alert();
        assert_eq!(alert.source.as_deref(), Some("polymarket"));
        assert!(alert.url.is_none());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let store = Store::new(Client::new(), "https://x.supabase.co/", "key");
        let url = store.table_url("market_history").unwrap();
        assert_eq!(
            url.as_str(),
            "https://x.supabase.co/rest/v1/market_history"
        );
    }
}
