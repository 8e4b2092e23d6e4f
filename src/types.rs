//! Shared dashboard wire schema.
//!
//! Every payload is camelCase on the wire and carries `updatedAt` plus empty
//! collections in its fallback form, so the dashboard degrades to an empty
//! panel instead of an error state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized prediction market, shared by the Polymarket and Kalshi
/// feeds (and echoed back by the snapshot/alert endpoints).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Market {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Implied probability of YES, as a decimal in [0, 1].
    pub yes_price: Option<f64>,
    pub no_price: Option<f64>,
    pub volume: f64,
    pub liquidity: f64,
    pub end_date: Option<String>,
    pub active: bool,
    pub url: String,
    pub source: String,
}

/// Envelope for a market feed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketsPayload {
    pub updated_at: DateTime<Utc>,
    pub markets: Vec<Market>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketsPayload {
    pub fn new(markets: Vec<Market>, now: DateTime<Utc>) -> Self {
        let count = markets.len();
        Self {
            updated_at: now,
            markets,
            count,
            error: None,
        }
    }

    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            markets: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// A normalized news/search result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    /// Registrable domain of the source, or "Web".
    pub source: String,
    pub published_at: Option<String>,
    pub severity: String,
}

/// A normalized social-video item.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoItem {
    /// Publish timestamp as reported upstream (shape varies by platform).
    pub ts: String,
    pub severity: String,
    pub title: String,
    /// Display metric string, e.g. "Views: 1.2M | Likes: 3.4K".
    pub metric: String,
    pub source: String,
    pub url: String,
}

/// A tracked campaign promise.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Promise {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub status: String,
    pub excerpt: String,
    pub keywords_found: Vec<String>,
}

/// Category of an AI-generated notable alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    Trend,
    Opportunity,
    Risk,
    Momentum,
}

impl AlertKind {
    /// Fixed digest ordering with display icon and label.
    pub const DIGEST_ORDER: [(AlertKind, &'static str, &'static str); 4] = [
        (AlertKind::Trend, "📈", "Trends"),
        (AlertKind::Opportunity, "💡", "Opportunities"),
        (AlertKind::Risk, "⚠️", "Risks"),
        (AlertKind::Momentum, "🚀", "Momentum"),
    ];
}

/// An AI-generated connection between data sources, shown in the notable
/// alerts panel and rolled into the weekly digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotableAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_accepts_partial_json() {
        let market: Market = serde_json::from_str(
            r#"{"id":"m1","title":"Will it pass?","yesPrice":0.42}"#,
        )
        .unwrap();
        assert_eq!(market.id, "m1");
        assert_eq!(market.yes_price, Some(0.42));
        assert!(market.no_price.is_none());
        assert_eq!(market.volume, 0.0);
    }

    #[test]
    fn alert_kind_wire_format() {
        let alert: NotableAlert = serde_json::from_str(
            r#"{"type":"RISK","title":"t","description":"d"}"#,
        )
        .unwrap();
        assert_eq!(alert.kind, AlertKind::Risk);
        let out = serde_json::to_value(&alert).unwrap();
        assert_eq!(out["type"], "RISK");
        assert!(out.get("url").is_none());
    }

    #[test]
    fn fallback_payload_is_empty_but_stamped() {
        let now = chrono::Utc::now();
        let payload = MarketsPayload::fallback("upstream 502", now);
        assert_eq!(payload.count, 0);
        assert!(payload.markets.is_empty());
        assert_eq!(payload.error.as_deref(), Some("upstream 502"));
    }
}
