//! Virlo social-video feeds: the daily trend digest and per-comet video
//! listings. A comet is a Virlo tracking collection; we only ever look one
//! up by name, never create one.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{pick_f64, pick_str, unwrap_rows};
use crate::VIRLO_API_BASE;
use crate::text::format_number;
use crate::types::VideoItem;

/// How many videos to request per comet, ordered by view count.
const VIDEOS_LIMIT: u32 = 50;

/// Trend items kept in the `allTrends` overview.
const ALL_TRENDS_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub trend_type: String,
    pub ranking: u64,
    pub severity: String,
    pub description: String,
    /// Title of the digest group the trend arrived under.
    pub group_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsPayload {
    pub updated_at: DateTime<Utc>,
    /// Trends matching the watch keywords.
    pub items: Vec<TrendItem>,
    /// Top of the overall digest regardless of keywords.
    pub all_trends: Vec<TrendItem>,
    pub total_trends: usize,
    pub matched_count: usize,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrendsPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            items: Vec::new(),
            all_trends: Vec::new(),
            total_trends: 0,
            matched_count: 0,
            source: "virlo".to_string(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideosPayload {
    pub updated_at: DateTime<Utc>,
    pub videos: Vec<VideoItem>,
    pub count: usize,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideosPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            videos: Vec::new(),
            count: 0,
            source: "virlo".to_string(),
            error: Some(error.into()),
        }
    }
}

/// Fetch the daily trend digest.
pub async fn fetch_trends(client: &Client, api_key: &str) -> Result<Value> {
    let url = format!("{VIRLO_API_BASE}/trends/digest");
    let response = client
        .get(&url)
        .bearer_auth(api_key)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Virlo trends request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Virlo trends API error: {status}");
    }
    response.json().await.context("invalid Virlo trends digest")
}

/// Find an existing comet whose name contains any of the configured
/// fragments. Returns its id, or None when nothing matches.
pub async fn find_comet(
    client: &Client,
    api_key: &str,
    name_fragments: &[String],
) -> Result<Option<String>> {
    let url = format!("{VIRLO_API_BASE}/comet/list");
    let response = client
        .get(&url)
        .bearer_auth(api_key)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Virlo comet list request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Virlo comet list API error: {status}");
    }
    let body: Value = response.json().await.context("invalid Virlo comet list")?;

    for comet in unwrap_rows(&body, &["data", "comets", "results"]) {
        let name = pick_str(comet, &["name", "title"]).to_lowercase();
        if name_fragments
            .iter()
            .any(|frag| name.contains(&frag.to_lowercase()))
        {
            let id = pick_str(comet, &["id", "comet_id", "cometId"]);
            if !id.is_empty() {
                debug!("Matched Virlo comet {id} ({name})");
                return Ok(Some(id));
            }
        }
    }
    Ok(None)
}

/// Fetch a comet's videos, most-viewed first.
pub async fn fetch_comet_videos(client: &Client, api_key: &str, comet_id: &str) -> Result<Value> {
    let url = format!(
        "{VIRLO_API_BASE}/comet/{comet_id}/videos?limit={VIDEOS_LIMIT}&orderBy=views&orderDirection=desc"
    );
    let response = client
        .get(&url)
        .bearer_auth(api_key)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("Virlo videos request for comet {comet_id} failed"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Virlo videos API error for comet {comet_id}: {status}");
    }
    response.json().await.context("invalid Virlo comet videos")
}

/// Reshape the trend digest. The digest is a list of groups (under `.data`
/// or bare), each with a `title` and a `trends` array; a group entry
/// either is the trend or wraps it under `.trend`, with the ranking on the
/// wrapper.
pub fn normalize_trends(
    digest: &Value,
    keywords: &[String],
    now: DateTime<Utc>,
) -> TrendsPayload {
    let mut all: Vec<TrendItem> = Vec::new();

    for group in unwrap_rows(digest, &["data"]) {
        let group_title = {
            let t = pick_str(group, &["title"]);
            if t.is_empty() { "Trends".to_string() } else { t }
        };
        let entries = match group.get("trends") {
            Some(Value::Array(entries)) => entries.iter().collect(),
            _ => Vec::new(),
        };
        for entry in entries {
            let trend = entry.get("trend").unwrap_or(entry);
            let name = pick_str(trend, &["name", "title"]);
            if name.is_empty() {
                continue;
            }
            let ranking = pick_f64(entry, &["ranking", "rank"]) as u64;
            let trend_type = {
                let t = pick_str(trend, &["trend_type", "trendType", "type"]);
                if t.is_empty() { "content".to_string() } else { t }
            };
            let id = {
                let raw = pick_str(trend, &["id"]);
                let raw = if raw.is_empty() { pick_str(entry, &["id"]) } else { raw };
                if raw.is_empty() { None } else { Some(raw) }
            };
            all.push(TrendItem {
                id,
                name,
                trend_type,
                ranking,
                severity: ranking_severity(ranking),
                description: pick_str(trend, &["description", "summary"]),
                group_title: group_title.clone(),
            });
        }
    }

    let total_trends = all.len();
    let items: Vec<TrendItem> = all
        .iter()
        .filter(|trend| {
            let haystack = format!("{} {}", trend.name, trend.description).to_lowercase();
            keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
        })
        .cloned()
        .collect();

    TrendsPayload {
        updated_at: now,
        matched_count: items.len(),
        items,
        all_trends: all.into_iter().take(ALL_TRENDS_LIMIT).collect(),
        total_trends,
        source: "virlo".to_string(),
        error: None,
    }
}

/// Reshape comet videos into the dashboard schema, deriving a severity tier
/// and a display metric line per video.
pub fn normalize_videos(body: &Value, now: DateTime<Utc>) -> VideosPayload {
    let videos: Vec<VideoItem> = unwrap_rows(body, &["data", "results", "items", "videos"])
        .into_iter()
        .map(|row| {
            let ts = {
                let raw = pick_str(
                    row,
                    &[
                        "timestamp",
                        "publishedAt",
                        "published_at",
                        "createdAt",
                        "created_at",
                        "date",
                    ],
                );
                if raw.is_empty() { now.to_rfc3339() } else { raw }
            };
            let title = {
                let t = pick_str(row, &["title", "caption", "description"]);
                if t.is_empty() { "Untitled".to_string() } else { t }
            };
            let source = {
                let s = pick_str(row, &["platform", "source"]);
                if s.is_empty() { "Social Media".to_string() } else { s }
            };
            VideoItem {
                severity: video_severity(row, &ts, now),
                metric: video_metric(row),
                title,
                source,
                url: pick_str(row, &["url", "link", "videoUrl", "video_url"]),
                ts,
            }
        })
        .collect();

    VideosPayload {
        updated_at: now,
        count: videos.len(),
        videos,
        source: "virlo".to_string(),
        error: None,
    }
}

/// Digest rank to severity tier.
fn ranking_severity(ranking: u64) -> String {
    let tier = if ranking > 0 && ranking <= 3 {
        "hot"
    } else if ranking > 0 && ranking <= 7 {
        "spike"
    } else if ranking > 0 && ranking <= 15 {
        "new"
    } else {
        "trending"
    };
    tier.to_string()
}

/// Severity for a video: an explicit upstream value wins, then view and
/// engagement thresholds, then recency.
fn video_severity(row: &Value, ts: &str, now: DateTime<Utc>) -> String {
    let explicit = pick_str(row, &["severity"]);
    if !explicit.is_empty() {
        return explicit;
    }

    let views = pick_f64(row, &["views", "viewCount", "view_count"]);
    let engagement = pick_f64(row, &["engagement", "engagementCount"]);
    let rate = pick_f64(row, &["engagementRate", "engagement_rate"]);

    if views > 1_000_000.0 || engagement > 100_000.0 || rate > 10.0 {
        return "hot".to_string();
    }
    if views > 500_000.0 || engagement > 50_000.0 || rate > 5.0 {
        return "spike".to_string();
    }

    let is_fresh = DateTime::parse_from_rfc3339(ts)
        .map(|posted| now.signed_duration_since(posted.with_timezone(&Utc)).num_hours() < 24)
        .unwrap_or(false);
    if is_fresh {
        return "new".to_string();
    }
    "trending".to_string()
}

/// "Views: 1.2M | Likes: 3.4K | ER: 8.1%", or "Tracking" when the upstream
/// row carries no counters at all.
fn video_metric(row: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();

    let views = pick_f64(row, &["views", "viewCount", "view_count"]);
    if views > 0.0 {
        parts.push(format!("Views: {}", format_number(views)));
    }
    let likes = pick_f64(row, &["likes", "likeCount", "like_count"]);
    if likes > 0.0 {
        parts.push(format!("Likes: {}", format_number(likes)));
    }
    let comments = pick_f64(row, &["comments", "commentCount", "comment_count"]);
    if comments > 0.0 {
        parts.push(format!("Comments: {}", format_number(comments)));
    }
    let shares = pick_f64(row, &["shares", "shareCount", "share_count"]);
    if shares > 0.0 {
        parts.push(format!("Shares: {}", format_number(shares)));
    }
    let rate = pick_f64(row, &["engagementRate", "engagement_rate"]);
    if rate > 0.0 {
        parts.push(format!("ER: {rate:.1}%"));
    }
    let engagement = pick_f64(row, &["engagement", "engagementCount"]);
    if engagement > 0.0 {
        parts.push(format!("Engagement: {}", format_number(engagement)));
    }

    if parts.is_empty() {
        "Tracking".to_string()
    } else {
        parts.join(" | ")
    }
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
    fn trends_match_keywords_and_rank_severity() {
        let digest = json!({"data": [
            {"title": "Political Moments", "trends": [
                {"ranking": 2, "trend": {"id": "t1", "name": "Mamdani grocery plan", "description": "city-run stores"}},
                {"ranking": 5, "name": "Dance challenge"},
            ]},
            {"title": "Sounds", "trends": [
                {"ranking": 40, "name": "Obscure meme", "trend_type": "audio"},
            ]},
        ]});
        let keywords = vec!["mamdani".to_string()];
        let payload = normalize_trends(&digest, &keywords, now());

        assert_eq!(payload.total_trends, 3);
        assert_eq!(payload.matched_count, 1);
        assert_eq!(payload.items[0].name, "Mamdani grocery plan");
        assert_eq!(payload.items[0].severity, "hot");
        assert_eq!(payload.items[0].id.as_deref(), Some("t1"));
        assert_eq!(payload.items[0].group_title, "Political Moments");
        assert_eq!(payload.all_trends[1].severity, "spike");
        assert_eq!(payload.all_trends[2].severity, "trending");
        assert_eq!(payload.all_trends[2].trend_type, "audio");
        assert_eq!(payload.all_trends[2].group_title, "Sounds");
        assert_eq!(payload.all_trends[1].trend_type, "content");
    }

    #[test]
    fn trends_accept_bare_group_array() {
        let digest = json!([{"trends": [{"name": "One", "ranking": 10}]}]);
        let payload = normalize_trends(&digest, &[], now());
        assert_eq!(payload.total_trends, 1);
        assert_eq!(payload.all_trends[0].severity, "new");
        // Untitled groups get the generic label.
        assert_eq!(payload.all_trends[0].group_title, "Trends");
        assert!(payload.all_trends[0].id.is_none());
    }

    #[test]
    fn video_severity_tiers() {
        let hot = json!({"title": "t", "views": 2_000_000});
        assert_eq!(video_severity(&hot, "", now()), "hot");

        let spike = json!({"title": "t", "views": 600_000});
        assert_eq!(video_severity(&spike, "", now()), "spike");

        let fresh = json!({"title": "t", "views": 100});
        assert_eq!(
            video_severity(&fresh, "2026-08-30T06:00:00Z", now()),
            "new"
        );

        let stale = json!({"title": "t", "views": 100});
        assert_eq!(
            video_severity(&stale, "2026-08-20T06:00:00Z", now()),
            "trending"
        );

        let explicit = json!({"title": "t", "severity": "hot", "views": 1});
        assert_eq!(video_severity(&explicit, "", now()), "hot");
    }

    #[test]
    fn metric_line_joins_available_counters() {
        let row = json!({"views": 1_200_000, "likes": 3_400, "engagementRate": 8.13});
        assert_eq!(video_metric(&row), "Views: 1.2M | Likes: 3.4K | ER: 8.1%");
        assert_eq!(video_metric(&json!({"title": "bare"})), "Tracking");
    }

    #[test]
    fn videos_fill_defaults() {
        let body = json!({"data": [{"caption": "Rally clip", "views": 10}]});
        let payload = normalize_videos(&body, now());
        assert_eq!(payload.count, 1);
        let video = &payload.videos[0];
        assert_eq!(video.title, "Rally clip");
        assert_eq!(video.source, "Social Media");
        // No upstream timestamp: stamped with the fetch time.
        assert_eq!(video.ts, now().to_rfc3339());
        assert_eq!(video.metric, "Views: 10");
    }

    #[test]
    fn untitled_video_fallback() {
        let body = json!([{"url": "https://tiktok.com/v/1"}]);
        let payload = normalize_videos(&body, now());
        assert_eq!(payload.videos[0].title, "Untitled");
        assert_eq!(payload.videos[0].url, "https://tiktok.com/v/1");
    }
}
