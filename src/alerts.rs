//! Alerting: breaking price-move emails, AI-generated notable alerts, and
//! the weekly digest that rolls unsent notable alerts up every Monday.

use anyhow::Result;
use chrono::{DateTime, Datelike, Days, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AlertConfig;
use crate::newsletter::Newsletter;
use crate::sources::llm;
use crate::store::Store;
use crate::types::{AlertKind, Market, NewsItem, NotableAlert, VideoItem};

/// Dedup key under which breaking sends are logged.
const BREAKING_ALERT_TYPE: &str = "price_spike";

/// A detected breaking price move, ready to become an email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingAlert {
    pub market_id: String,
    pub title: String,
    pub old_price: f64,
    pub current_price: f64,
    /// Signed percent change, one decimal.
    pub change_percent: f64,
    /// "up" or "down".
    pub direction: String,
    pub url: String,
}

/// Compare a market's current yes price against a historical one. Returns
/// an alert when the relative move meets the threshold.
pub fn detect_breaking(
    market: &Market,
    old_price: f64,
    threshold: f64,
) -> Option<BreakingAlert> {
    let current = market.yes_price?;
    if old_price <= 0.0 {
        return None;
    }
    let delta = (current - old_price) / old_price;
    if delta.abs() < threshold {
        return None;
    }
    Some(BreakingAlert {
        market_id: market.id.clone(),
        title: market.title.clone(),
        old_price,
        current_price: current,
        change_percent: (delta * 1000.0).round() / 10.0,
        direction: if delta > 0.0 { "up" } else { "down" }.to_string(),
        url: market.url.clone(),
    })
}

/// Subject and markdown body for a breaking alert email.
pub fn format_breaking_email(alert: &BreakingAlert, config: &AlertConfig) -> (String, String) {
    let arrow = if alert.direction == "up" { "📈" } else { "📉" };
    let subject = format!(
        "🚨 Breaking: {} {arrow} {:+.1}%",
        alert.title, alert.change_percent
    );
    let body = format!(
        "## {}\n\n\
         The market moved {} **{:+.1}%** in the last hour.\n\n\
         - Previous: {:.0}% YES\n\
         - Current: **{:.0}% YES**\n\n\
         [View Market]({})\n\n\
         ---\n\
         You are receiving this because you subscribed to breaking alerts \
         from {}. Manage your subscription at {}.",
        alert.title,
        alert.direction,
        alert.change_percent,
        alert.old_price * 100.0,
        alert.current_price * 100.0,
        alert.url,
        config.site_name,
        config.site_url,
    );
    (subject, body)
}

/// Check every market for a breaking move and email the ones that qualify.
/// Per-market failures are logged and skipped; returns how many alerts
/// went out.
pub async fn run_breaking_check(
    store: &Store,
    newsletter: &Newsletter,
    markets: &[Market],
    config: &AlertConfig,
    now: DateTime<Utc>,
) -> Result<usize> {
    let lookback = now - Duration::hours(config.lookback_hours);
    let dedup_since = start_of_day(now);
    let mut sent = 0;

    for market in markets {
        if market.yes_price.is_none() {
            continue;
        }
        let old_price = match store.price_at_or_before(&market.id, lookback).await {
            Ok(Some(price)) => price,
            Ok(None) => continue,
            Err(e) => {
                warn!("price history lookup failed for {}: {e:#}", market.id);
                continue;
            }
        };
        let Some(alert) = detect_breaking(market, old_price, config.price_change_threshold)
        else {
            continue;
        };

        // One alert per market per UTC day.
        match store
            .alert_sent_since(&market.id, BREAKING_ALERT_TYPE, dedup_since)
            .await
        {
            Ok(true) => {
                info!("breaking alert for {} already sent today, skipping", market.id);
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("alert dedup check failed for {}: {e:#}", market.id);
                continue;
            }
        }

        let (subject, body) = format_breaking_email(&alert, config);
        if let Err(e) = newsletter
            .send_email(&subject, &body, &[config.breaking_tag.as_str()])
            .await
        {
            warn!("breaking alert send failed for {}: {e:#}", market.id);
            continue;
        }
        if let Err(e) = store
            .record_alert_sent(&market.id, BREAKING_ALERT_TYPE)
            .await
        {
            warn!("failed to log sent alert for {}: {e:#}", market.id);
        }
        sent += 1;
    }

    Ok(sent)
}

/// UTC midnight of the day containing `now`.
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

// ── Notable alerts ─────────────────────────────────────────────

/// Prompt asking the model to connect the day's videos, news, and market
/// prices into a handful of notable alerts.
pub fn build_alert_prompt(
    videos: &[VideoItem],
    news: &[NewsItem],
    markets: &[Market],
) -> String {
    let mut prompt = String::from(
        "You are the analyst for a civic dashboard tracking NYC Mayor Zohran \
         Mamdani. Connect the signals below into the most notable alerts of \
         the day.\n\nRecent signals:\n",
    );
    for video in videos.iter().take(5) {
        prompt.push_str(&format!("- Video: {} ({})\n", video.title, video.metric));
    }
    for item in news.iter().take(5) {
        prompt.push_str(&format!("- News: {} - {}\n", item.title, item.description));
    }
    for market in markets.iter().take(7) {
        let yes = market.yes_price.map(|p| (p * 100.0).round()).unwrap_or(0.0);
        prompt.push_str(&format!("- Market: \"{}\" - {yes:.0}% YES\n", market.title));
    }
    prompt.push_str(
        "\nProduce 2-4 alerts. Each has a type of TREND, OPPORTUNITY, RISK, \
         or MOMENTUM, a short title, and a one-sentence description tying at \
         least two signals together.\n\
         Respond with JSON only, no other text: \
         {\"alerts\": [{\"type\": \"TREND\", \"title\": \"...\", \
         \"description\": \"...\"}]}",
    );
    prompt
}

/// Parse the model reply into alerts; anything malformed yields an empty
/// list rather than an error.
pub fn parse_alerts(reply: &str) -> Vec<NotableAlert> {
    let Some(value) = llm::extract_json(reply) else {
        return Vec::new();
    };
    let Some(raw) = value.get("alerts").and_then(Value::as_array) else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

/// Attach a source link to each alert by matching its title words against
/// the news and video items that fed the prompt.
pub fn enrich_alerts_with_urls(
    alerts: &mut [NotableAlert],
    news: &[NewsItem],
    videos: &[VideoItem],
) {
    for alert in alerts.iter_mut() {
        if alert.url.is_some() {
            continue;
        }
        let words: Vec<String> = alert
            .title
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            continue;
        }

        if let Some(item) = news.iter().find(|n| {
            let title = n.title.to_lowercase();
            words.iter().any(|w| title.contains(w.as_str()))
        }) {
            alert.url = Some(item.url.clone());
            alert.source = Some(item.source.clone());
            continue;
        }
        if let Some(video) = videos.iter().find(|v| {
            let title = v.title.to_lowercase();
            words.iter().any(|w| title.contains(w.as_str()))
        }) {
            alert.url = Some(video.url.clone());
            alert.source = Some(video.source.clone());
        }
    }
}

// ── Weekly digest ──────────────────────────────────────────────

/// The Monday-through-Friday window of the most recently completed work
/// week. Run on a Monday it covers the prior week, any other day the week
/// in progress's predecessor.
pub fn last_week_range(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let dow = now.weekday().num_days_from_sunday() as u64;
    let days_back = if dow == 0 { 6 } else { dow + 6 };
    let monday = now
        .date_naive()
        .checked_sub_days(Days::new(days_back))
        .unwrap_or_else(|| now.date_naive());
    let start = monday
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let friday = monday.checked_add_days(Days::new(4)).unwrap_or(monday);
    let end = friday
        .and_hms_opt(23, 59, 59)
        .expect("end of day is always valid")
        .and_utc();
    (start, end)
}

/// Subject and markdown body for the weekly digest, grouping alerts by
/// kind in fixed display order.
pub fn compose_digest(
    alerts: &[NotableAlert],
    range: (DateTime<Utc>, DateTime<Utc>),
    config: &AlertConfig,
) -> (String, String) {
    let (start, end) = range;
    let subject = format!(
        "📊 {} Weekly Digest - {} to {}",
        config.site_name,
        start.format("%b %-d"),
        end.format("%b %-d"),
    );

    let mut body = format!(
        "# Week of {} - {}\n\nThe notable signals from the week, as they \
         happened.\n",
        start.format("%b %-d"),
        end.format("%b %-d"),
    );
    for (kind, icon, label) in AlertKind::DIGEST_ORDER {
        let group: Vec<&NotableAlert> = alerts.iter().filter(|a| a.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        body.push_str(&format!("\n## {icon} {label}\n\n"));
        for alert in group {
            match &alert.url {
                Some(url) => body.push_str(&format!(
                    "- **[{}]({url})** - {}\n",
                    alert.title, alert.description
                )),
                None => body.push_str(&format!(
                    "- **{}** - {}\n",
                    alert.title, alert.description
                )),
            }
        }
    }
    body.push_str(&format!(
        "\n---\nFrom {}. Manage your subscription at {}.\n",
        config.site_name, config.site_url,
    ));
    (subject, body)
}

/// Send the weekly digest: collect the prior work week's unsent notable
/// alerts, email them grouped by kind, and mark them claimed. Returns the
/// number of alerts included (zero means no email was sent).
pub async fn run_weekly_digest(
    store: &Store,
    newsletter: &Newsletter,
    config: &AlertConfig,
    now: DateTime<Utc>,
) -> Result<usize> {
    let range = last_week_range(now);
    let stored = store.unsent_alerts_between(range.0, range.1).await?;
    if stored.is_empty() {
        info!("no unsent alerts in the digest window, skipping send");
        return Ok(0);
    }

    let alerts: Vec<NotableAlert> = stored.iter().map(|s| s.to_alert()).collect();
    let (subject, body) = compose_digest(&alerts, range, config);
    newsletter
        .send_email(&subject, &body, &[config.digest_tag.as_str()])
        .await?;

    let ids: Vec<i64> = stored.iter().map(|s| s.id).collect();
    store.mark_alerts_sent(&ids).await?;
    Ok(alerts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn market(id: &str, title: &str, yes: Option<f64>) -> Market {
        Market {
            id: id.to_string(),
            title: title.to_string(),
            yes_price: yes,
            url: format!("https://example.com/{id}"),
            ..Default::default()
        }
    }

    #[test]
    fn breaking_threshold_edges() {
        let m = market("1", "Rent freeze?", Some(0.55));
        // 0.50 -> 0.55 is exactly +10%.
        let alert = detect_breaking(&m, 0.50, 0.10).unwrap();
        assert_eq!(alert.direction, "up");
        assert!((alert.change_percent - 10.0).abs() < 1e-9);
        // Just under threshold.
        assert!(detect_breaking(&m, 0.51, 0.10).is_none());
        // No current price, or a zero baseline.
        assert!(detect_breaking(&market("2", "t", None), 0.5, 0.10).is_none());
        assert!(detect_breaking(&m, 0.0, 0.10).is_none());
    }

    #[test]
    fn dedup_window_is_the_current_utc_day() {
        let late = Utc.with_ymd_and_hms(2026, 8, 30, 23, 30, 0).unwrap();
        assert_eq!(
            start_of_day(late).to_rfc3339(),
            "2026-08-30T00:00:00+00:00"
        );
        // Not a rolling 24h window: a send at 00:10 still blocks 23:50.
        let early = Utc.with_ymd_and_hms(2026, 8, 30, 0, 10, 0).unwrap();
        assert_eq!(start_of_day(early), start_of_day(late));
    }

    #[test]
    fn breaking_down_move() {
        let m = market("1", "Rent freeze?", Some(0.40));
        let alert = detect_breaking(&m, 0.50, 0.10).unwrap();
        assert_eq!(alert.direction, "down");
        assert!((alert.change_percent - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn breaking_email_copy() {
        let alert = BreakingAlert {
            market_id: "1".to_string(),
            title: "Rent freeze by 2027?".to_string(),
            old_price: 0.50,
            current_price: 0.62,
            change_percent: 24.0,
            direction: "up".to_string(),
            url: "https://polymarket.com/event/rent-freeze".to_string(),
        };
        let config = AlertConfig::default();
        let (subject, body) = format_breaking_email(&alert, &config);
        assert!(subject.starts_with("🚨 Breaking: Rent freeze by 2027? 📈 +24.0%"));
        assert!(body.contains("- Previous: 50% YES"));
        assert!(body.contains("**62% YES**"));
        assert!(body.contains("[View Market](https://polymarket.com/event/rent-freeze)"));
        assert!(body.contains(&config.site_url));
    }

    #[test]
    fn week_range_from_each_weekday() {
        // 2026-08-30 is a Sunday; the prior work week is Aug 24-28.
        let sunday = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        let (start, end) = last_week_range(sunday);
        assert_eq!(start.to_rfc3339(), "2026-08-24T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-08-28T23:59:59+00:00");

        // Monday still reports the completed week behind it.
        let monday = Utc.with_ymd_and_hms(2026, 8, 31, 9, 0, 0).unwrap();
        let (start, end) = last_week_range(monday);
        assert_eq!(start.to_rfc3339(), "2026-08-24T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-08-28T23:59:59+00:00");

        // Wednesday mid-week points at the same completed week.
        let wednesday = Utc.with_ymd_and_hms(2026, 9, 2, 9, 0, 0).unwrap();
        let (start, _) = last_week_range(wednesday);
        assert_eq!(start.to_rfc3339(), "2026-08-24T00:00:00+00:00");
    }

    #[test]
    fn alert_parsing_tolerates_prose_and_junk() {
        let reply = "Here are the alerts:\n{\"alerts\": [\
            {\"type\": \"TREND\", \"title\": \"Grocery buzz\", \"description\": \"d\"},\
            {\"type\": \"INVALID\", \"title\": \"x\", \"description\": \"d\"},\
            {\"type\": \"RISK\", \"title\": \"Landlord suit\", \"description\": \"d\"}\
        ]}";
        let alerts = parse_alerts(reply);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, AlertKind::Trend);
        assert_eq!(alerts[1].kind, AlertKind::Risk);
        assert!(parse_alerts("no json here").is_empty());
    }

    #[test]
    fn alerts_pick_up_source_urls() {
        let mut alerts = vec![NotableAlert {
            kind: AlertKind::Trend,
            title: "Grocery plan gains steam".to_string(),
            description: "d".to_string(),
            url: None,
            source: None,
        }];
        let news = vec![NewsItem {
            title: "City grocery pilot expands".to_string(),
            url: "https://gothamist.com/grocery".to_string(),
            source: "gothamist.com".to_string(),
            ..Default::default()
        }];
        enrich_alerts_with_urls(&mut alerts, &news, &[]);
        assert_eq!(alerts[0].url.as_deref(), Some("https://gothamist.com/grocery"));
        assert_eq!(alerts[0].source.as_deref(), Some("gothamist.com"));
    }

    #[test]
    fn digest_groups_in_fixed_order() {
        let alerts = vec![
            NotableAlert {
                kind: AlertKind::Risk,
                title: "R1".to_string(),
                description: "risk one".to_string(),
                url: None,
                source: None,
            },
            NotableAlert {
                kind: AlertKind::Trend,
                title: "T1".to_string(),
                description: "trend one".to_string(),
                url: Some("https://x.com/t1".to_string()),
                source: None,
            },
        ];
        let config = AlertConfig::default();
        let range = last_week_range(Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap());
        let (subject, body) = compose_digest(&alerts, range, &config);

        assert!(subject.contains("Weekly Digest"));
        assert!(subject.contains("Aug 24"));
        let trends_at = body.find("📈 Trends").unwrap();
        let risks_at = body.find("⚠️ Risks").unwrap();
        assert!(trends_at < risks_at);
        assert!(body.contains("[T1](https://x.com/t1)"));
        assert!(!body.contains("Opportunities"));
    }

    #[test]
    fn prompt_lists_signals_and_demands_json() {
        let markets = vec![market("1", "Rent freeze?", Some(0.42))];
        let news = vec![NewsItem {
            title: "Freeze vote".to_string(),
            description: "Board votes".to_string(),
            ..Default::default()
        }];
        let prompt = build_alert_prompt(&[], &news, &markets);
        assert!(prompt.contains("- News: Freeze vote - Board votes"));
        assert!(prompt.contains("- Market: \"Rent freeze?\" - 42% YES"));
        assert!(prompt.contains("JSON only"));
    }
}
