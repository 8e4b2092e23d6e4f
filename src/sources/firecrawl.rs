//! Firecrawl web search (news panel) and page scraping (platform text for
//! the promise tracker).

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{pick_str, unwrap_rows};
use crate::FIRECRAWL_API_BASE;
use crate::text::{extract_domain, truncate};
use crate::types::NewsItem;

const SEARCH_LIMIT: u32 = 10;
const DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPayload {
    pub updated_at: DateTime<Utc>,
    pub items: Vec<NewsItem>,
    pub count: usize,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NewsPayload {
    pub fn new(items: Vec<NewsItem>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            count: items.len(),
            items,
            source: "web-search".to_string(),
            error: None,
        }
    }

    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            items: Vec::new(),
            count: 0,
            source: "web-search".to_string(),
            error: Some(error.into()),
        }
    }
}

/// Run a web search.
pub async fn search(client: &Client, api_key: &str, query: &str) -> Result<Value> {
    let url = format!("{FIRECRAWL_API_BASE}/search");
    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&json!({"query": query, "limit": SEARCH_LIMIT}))
        .send()
        .await
        .context("Firecrawl search request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Firecrawl search API error: {status}");
    }
    response.json().await.context("invalid Firecrawl search response")
}

/// Scrape one page and return its markdown body.
pub async fn scrape(client: &Client, api_key: &str, page_url: &str) -> Result<String> {
    let url = format!("{FIRECRAWL_API_BASE}/scrape");
    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&json!({
            "url": page_url,
            "formats": ["markdown", "html"],
            "onlyMainContent": true,
            "waitFor": 2000,
            "timeout": 30000
        }))
        .send()
        .await
        .with_context(|| format!("Firecrawl scrape of {page_url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Firecrawl scrape API error for {page_url}: {status}");
    }
    let body: Value = response
        .json()
        .await
        .context("invalid Firecrawl scrape response")?;
    let markdown = body
        .pointer("/data/markdown")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if markdown.is_empty() {
        bail!("Firecrawl scrape of {page_url} returned no markdown");
    }
    Ok(markdown.to_string())
}

/// Reshape search results into news items. Results arrive under `.data`,
/// `.results`, or as a bare array; title and description fall back to the
/// page metadata and then to a content excerpt.
pub fn normalize_search(body: &Value, now: DateTime<Utc>) -> NewsPayload {
    let items: Vec<NewsItem> = unwrap_rows(body, &["data", "results"])
        .into_iter()
        .map(|row| {
            let url = pick_str(row, &["url", "link"]);
            let title = first_non_empty(&[
                pick_str(row, &["title"]),
                meta_str(row, "title"),
                "Untitled".to_string(),
            ]);
            let description = first_non_empty(&[
                pick_str(row, &["description", "snippet"]),
                meta_str(row, "description"),
                truncate(&pick_str(row, &["markdown", "content"]), DESCRIPTION_MAX_CHARS),
            ]);
            let published_at = {
                let raw = first_non_empty(&[
                    pick_str(row, &["publishedAt", "published_at", "date"]),
                    meta_str(row, "publishedTime"),
                ]);
                if raw.is_empty() { None } else { Some(raw) }
            };
            NewsItem {
                title,
                description,
                source: extract_domain(&url),
                url,
                published_at,
                severity: "news".to_string(),
            }
        })
        .collect();

    NewsPayload::new(items, now)
}

fn meta_str(row: &Value, key: &str) -> String {
    row.get("metadata")
        .map(|meta| pick_str(meta, &[key]))
        .unwrap_or_default()
}

fn first_non_empty(candidates: &[String]) -> String {
    candidates
        .iter()
        .find(|c| !c.is_empty())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn search_results_normalize() {
        let body = json!({"data": [
            {
                "title": "Mayor announces rent freeze",
                "description": "The board voted 6-3.",
                "url": "https://www.gothamist.com/news/rent-freeze",
                "publishedAt": "2026-08-29"
            }
        ]});
        let payload = normalize_search(&body, now());
        assert_eq!(payload.count, 1);
        let item = &payload.items[0];
        assert_eq!(item.source, "gothamist.com");
        assert_eq!(item.severity, "news");
        assert_eq!(item.published_at.as_deref(), Some("2026-08-29"));
    }

    #[test]
    fn falls_back_to_metadata_then_content() {
        let long = "m".repeat(400);
        let body = json!([{
            "url": "https://nytimes.com/x",
            "metadata": {"title": "Meta title"},
            "markdown": long
        }]);
        let payload = normalize_search(&body, now());
        let item = &payload.items[0];
        assert_eq!(item.title, "Meta title");
        assert_eq!(item.description.chars().count(), 200);
        assert!(item.description.ends_with("..."));
    }

    #[test]
    fn missing_everything_still_yields_item() {
        let payload = normalize_search(&json!([{}]), now());
        let item = &payload.items[0];
        assert_eq!(item.title, "Untitled");
        assert_eq!(item.description, "");
        assert_eq!(item.source, "Web");
        assert!(item.published_at.is_none());
    }

    #[test]
    fn unexpected_shape_yields_empty() {
        let payload = normalize_search(&json!({"success": true}), now());
        assert_eq!(payload.count, 0);
        assert!(payload.error.is_none());
    }
}
