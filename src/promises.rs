//! Campaign promise tracking: pulling promises out of the platform page,
//! scoring completion against news and video coverage, and enriching each
//! promise with related markets and content.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::sources::llm;
use crate::text::truncate;
use crate::types::{Market, NewsItem, Promise, VideoItem};

const EXCERPT_MAX_CHARS: usize = 200;
const EVIDENCE_LIMIT: usize = 3;
const MATCHED_MARKETS_LIMIT: usize = 3;
const MATCHED_CONTENT_LIMIT: usize = 5;

/// A policy area scanned for on the platform page.
pub struct CampaignArea {
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub keywords: &'static [&'static str],
}

/// Wording that suggests a promise moved from plan to reality.
const COMPLETION_PHRASES: &[&str] = &[
    "signed into law",
    "becomes law",
    "enacted",
    "approved",
    "passed",
    "implemented",
    "launched",
    "achieved",
    "completed",
    "fulfilled",
    "delivered",
    "announced today",
    "officially",
    "begins today",
    "now in effect",
    "takes effect",
    "rollout begins",
    "program launched",
    "initiative launched",
    "successfully",
    "milestone reached",
    "goal met",
    "target achieved",
];

pub fn campaign_areas() -> &'static [CampaignArea] {
    &[
        CampaignArea {
            id: "housing",
            title: "Housing & Rent",
            icon: "🏠",
            keywords: &["rent freeze", "rent stabiliz", "affordable housing", "social housing", "tenant"],
        },
        CampaignArea {
            id: "transit",
            title: "Free & Fast Buses",
            icon: "🚌",
            keywords: &["fare-free", "free bus", "fast bus", "bus lane", "transit"],
        },
        CampaignArea {
            id: "safety",
            title: "Community Safety",
            icon: "🛡️",
            keywords: &["community safety", "public safety", "mental health response", "violence prevention"],
        },
        CampaignArea {
            id: "grocery",
            title: "City-Owned Groceries",
            icon: "🛒",
            keywords: &["city-owned grocer", "municipal grocer", "grocery store", "food cost"],
        },
        CampaignArea {
            id: "healthcare",
            title: "Healthcare",
            icon: "🏥",
            keywords: &["healthcare", "health care", "hospital", "clinic"],
        },
        CampaignArea {
            id: "workers",
            title: "Workers & Wages",
            icon: "✊",
            keywords: &["minimum wage", "union", "worker", "wage theft"],
        },
        CampaignArea {
            id: "environment",
            title: "Climate & Environment",
            icon: "🌱",
            keywords: &["climate", "green", "renewable", "environment"],
        },
        CampaignArea {
            id: "democracy",
            title: "Democracy & Engagement",
            icon: "🗳️",
            keywords: &["civic engagement", "town hall", "participatory", "democracy"],
        },
    ]
}

/// Scan platform-page markdown for the campaign areas. A promise is
/// emitted per area whose keywords appear, with an excerpt built from the
/// first matching line plus the two lines after it. Falls back to the
/// known platform positions when nothing matches (page redesigns).
pub fn extract_promises(markdown: &str) -> Vec<Promise> {
    let lower = markdown.to_lowercase();
    let lines: Vec<&str> = markdown.lines().collect();
    let mut promises: Vec<Promise> = Vec::new();

    for area in campaign_areas() {
        let found: Vec<String> = area
            .keywords
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| kw.to_string())
            .collect();
        if found.is_empty() {
            continue;
        }

        let excerpt = excerpt_around(&lines, &found).unwrap_or_default();
        promises.push(Promise {
            id: area.id.to_string(),
            title: area.title.to_string(),
            icon: area.icon.to_string(),
            status: "active".to_string(),
            excerpt,
            keywords_found: found,
        });
    }

    if promises.is_empty() {
        return fallback_promises();
    }
    promises
}

/// First line containing a keyword, joined with the next two lines; only
/// kept when the result is substantial.
fn excerpt_around(lines: &[&str], keywords: &[String]) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if keywords.iter().any(|kw| lower.contains(kw.as_str())) {
            let joined = lines[i..lines.len().min(i + 3)]
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if joined.chars().count() > 20 {
                return Some(truncate(&joined, EXCERPT_MAX_CHARS));
            }
        }
    }
    None
}

/// Known platform positions, used when the scrape yields nothing usable.
pub fn fallback_promises() -> Vec<Promise> {
    let positions: [(&str, &str, &str, &str); 6] = [
        (
            "rent-freeze",
            "Freeze the Rent",
            "🏠",
            "Freeze rents for all stabilized tenants across the city.",
        ),
        (
            "fare-free",
            "Fare-Free Buses",
            "🚌",
            "Make every city bus fare-free and faster.",
        ),
        (
            "community-safety",
            "Department of Community Safety",
            "🛡️",
            "Stand up a Department of Community Safety for mental health crisis response.",
        ),
        (
            "city-grocery",
            "City-Owned Grocery Stores",
            "🛒",
            "Open city-owned grocery stores to bring food costs down.",
        ),
        (
            "bad-landlords",
            "Crack Down on Bad Landlords",
            "🏚️",
            "Hold negligent landlords accountable for unsafe buildings.",
        ),
        (
            "mass-engagement",
            "Mass Civic Engagement",
            "🗳️",
            "Keep New Yorkers organized and engaged past election day.",
        ),
    ];

    positions
        .into_iter()
        .map(|(id, title, icon, excerpt)| Promise {
            id: id.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
            status: "active".to_string(),
            excerpt: excerpt.to_string(),
            keywords_found: Vec::new(),
        })
        .collect()
}

// ── Completion analysis ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub title: String,
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromiseCompletion {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub status: String,
    pub confidence: String,
    pub score: u32,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub completed: usize,
    pub total: usize,
    pub completed_promises: Vec<PromiseCompletion>,
    pub in_progress_promises: Vec<PromiseCompletion>,
    pub last_checked: DateTime<Utc>,
}

struct ContentItem {
    text: String,
    title: String,
    source: String,
    url: String,
}

fn collect_content(news: &[NewsItem], videos: &[VideoItem]) -> Vec<ContentItem> {
    let mut items: Vec<ContentItem> = news
        .iter()
        .map(|n| ContentItem {
            text: format!("{} {}", n.title, n.description).to_lowercase(),
            title: n.title.clone(),
            source: n.source.clone(),
            url: n.url.clone(),
        })
        .collect();
    items.extend(videos.iter().map(|v| ContentItem {
        text: v.title.to_lowercase(),
        title: v.title.clone(),
        source: v.source.clone(),
        url: v.url.clone(),
    }));
    items
}

/// Score each promise against recent coverage. An item relates to a
/// promise when it mentions one of the promise's keywords or the start of
/// its title; completion phrases in related items accumulate the score.
pub fn analyze_completion(
    promises: &[Promise],
    news: &[NewsItem],
    videos: &[VideoItem],
    now: DateTime<Utc>,
) -> CompletionSummary {
    let content = collect_content(news, videos);
    let mut completed_promises: Vec<PromiseCompletion> = Vec::new();
    let mut in_progress_promises: Vec<PromiseCompletion> = Vec::new();

    for promise in promises {
        let title_stub: String = promise.title.to_lowercase().chars().take(20).collect();
        let mut score: u32 = 0;
        let mut evidence: Vec<Evidence> = Vec::new();

        for item in &content {
            let related = promise
                .keywords_found
                .iter()
                .any(|kw| item.text.contains(&kw.to_lowercase()))
                || (!title_stub.trim().is_empty() && item.text.contains(title_stub.trim()));
            if !related {
                continue;
            }
            let hits = COMPLETION_PHRASES
                .iter()
                .filter(|phrase| item.text.contains(*phrase))
                .count() as u32;
            if hits > 0 {
                score += hits;
                if evidence.len() < EVIDENCE_LIMIT {
                    evidence.push(Evidence {
                        title: item.title.clone(),
                        source: item.source.clone(),
                        url: item.url.clone(),
                    });
                }
            }
        }

        let completed = score >= 3 || evidence.len() >= 2;
        let entry = PromiseCompletion {
            id: promise.id.clone(),
            title: promise.title.clone(),
            icon: promise.icon.clone(),
            status: if completed { "completed" } else { "in_progress" }.to_string(),
            confidence: if completed {
                if score >= 5 { "high" } else { "medium" }
            } else if score >= 1 {
                "medium"
            } else {
                "low"
            }
            .to_string(),
            score,
            evidence,
        };
        if completed {
            completed_promises.push(entry);
        } else {
            in_progress_promises.push(entry);
        }
    }

    CompletionSummary {
        completed: completed_promises.len(),
        total: promises.len(),
        completed_promises,
        in_progress_promises,
        last_checked: now,
    }
}

// ── Enrichment ─────────────────────────────────────────────────

struct MarketMap {
    promise_id: &'static str,
    slugs: &'static [&'static str],
    tickers: &'static [&'static str],
    keywords: &'static [&'static str],
}

/// Hand-maintained bridge from promise ids to the prediction markets that
/// price them. Slugs and tickers must track the curated watch lists.
const MARKET_MAP: &[MarketMap] = &[
    MarketMap {
        promise_id: "rent-freeze",
        slugs: &["will-mamdani-freeze-nyc-rents-before-2027"],
        tickers: &["KXNYCRENTFREEZE-27JAN01"],
        keywords: &["rent", "freeze", "housing", "tenant"],
    },
    MarketMap {
        promise_id: "fare-free",
        slugs: &["will-mamdani-make-nyc-buses-free-by-march-31"],
        tickers: &["KXNYCFREEBUS-27MAR31"],
        keywords: &["bus", "fare", "free", "transit", "mta"],
    },
    MarketMap {
        promise_id: "city-grocery",
        slugs: &["mamdani-opens-city-owned-grocery-store-by-june-30"],
        tickers: &["KXNYCGROCERY-26JUN30"],
        keywords: &["grocery", "food", "supermarket", "city-owned"],
    },
    MarketMap {
        promise_id: "housing",
        slugs: &["will-mamdani-freeze-nyc-rents-before-2027"],
        tickers: &["KXNYCRENTFREEZE-27JAN01"],
        keywords: &["rent", "housing", "tenant", "landlord", "affordable"],
    },
    MarketMap {
        promise_id: "transit",
        slugs: &["will-mamdani-make-nyc-buses-free-by-march-31"],
        tickers: &["KXNYCFREEBUS-27MAR31"],
        keywords: &["bus", "transit", "fare", "transportation", "mta"],
    },
    MarketMap {
        promise_id: "grocery",
        slugs: &["mamdani-opens-city-owned-grocery-store-by-june-30"],
        tickers: &["KXNYCGROCERY-26JUN30"],
        keywords: &["grocery", "food", "supermarket"],
    },
    MarketMap {
        promise_id: "workers",
        slugs: &["will-mamdani-raise-the-minimum-wage-to-30-before-2027"],
        tickers: &["KXNYCMINWAGE-27JAN01"],
        keywords: &["worker", "wage", "minimum", "labor", "union"],
    },
    MarketMap {
        promise_id: "bad-landlords",
        slugs: &["will-mamdani-freeze-nyc-rents-before-2027"],
        tickers: &["KXNYCRENTFREEZE-27JAN01"],
        keywords: &["landlord", "tenant", "housing", "rent"],
    },
    MarketMap {
        promise_id: "democracy",
        slugs: &[],
        tickers: &[],
        keywords: &["democracy", "engagement", "participatory", "vote"],
    },
    MarketMap {
        promise_id: "mass-engagement",
        slugs: &[],
        tickers: &[],
        keywords: &["engagement", "democracy", "participatory"],
    },
    MarketMap {
        promise_id: "community-safety",
        slugs: &[],
        tickers: &[],
        keywords: &["safety", "community", "police", "crisis"],
    },
    MarketMap {
        promise_id: "healthcare",
        slugs: &[],
        tickers: &["KXNYCCHILDCARE-27JAN01"],
        keywords: &["health", "care", "medical", "childcare"],
    },
    MarketMap {
        promise_id: "environment",
        slugs: &[],
        tickers: &[],
        keywords: &["climate", "green", "environment", "energy"],
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromiseEnrichment {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub markets: Vec<Market>,
    pub news: Vec<NewsItem>,
    pub videos: Vec<VideoItem>,
    pub velocity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_reason: Option<String>,
    pub total_content: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentPayload {
    pub updated_at: DateTime<Utc>,
    pub promises: Vec<PromiseEnrichment>,
    pub count: usize,
}

fn map_for(promise_id: &str) -> Option<&'static MarketMap> {
    MARKET_MAP.iter().find(|m| m.promise_id == promise_id)
}

/// Attach the markets, news, and videos that mention each promise, and a
/// content-volume velocity tier.
pub fn enrich_promises(
    promises: &[Promise],
    markets: &[Market],
    news: &[NewsItem],
    videos: &[VideoItem],
    now: DateTime<Utc>,
) -> EnrichmentPayload {
    let enriched: Vec<PromiseEnrichment> = promises
        .iter()
        .map(|promise| {
            let mapping = map_for(&promise.id);
            let keywords: Vec<String> = mapping
                .map(|m| m.keywords.iter().map(|k| k.to_string()).collect())
                .unwrap_or_else(|| promise.keywords_found.clone());

            let matched_markets: Vec<Market> = markets
                .iter()
                .filter(|market| {
                    let slug = market.slug.to_lowercase();
                    let ticker = market.id.to_uppercase();
                    let direct = mapping.is_some_and(|m| {
                        m.slugs.iter().any(|s| slug.contains(s))
                            || m.tickers.iter().any(|t| ticker.contains(t))
                    });
                    let title = market.title.to_lowercase();
                    direct || keywords.iter().any(|kw| title.contains(&kw.to_lowercase()))
                })
                .take(MATCHED_MARKETS_LIMIT)
                .cloned()
                .collect();

            let matched_news: Vec<NewsItem> = news
                .iter()
                .filter(|item| {
                    let text = format!("{} {}", item.title, item.description).to_lowercase();
                    keywords.iter().any(|kw| text.contains(&kw.to_lowercase()))
                })
                .take(MATCHED_CONTENT_LIMIT)
                .cloned()
                .collect();

            let matched_videos: Vec<VideoItem> = videos
                .iter()
                .filter(|video| {
                    let title = video.title.to_lowercase();
                    keywords.iter().any(|kw| title.contains(&kw.to_lowercase()))
                })
                .take(MATCHED_CONTENT_LIMIT)
                .cloned()
                .collect();

            let total_content = matched_news.len() + matched_videos.len();
            let velocity = if total_content >= 5 {
                "high"
            } else if total_content >= 2 {
                "medium"
            } else {
                "low"
            };

            PromiseEnrichment {
                id: promise.id.clone(),
                title: promise.title.clone(),
                icon: promise.icon.clone(),
                markets: matched_markets,
                news: matched_news,
                videos: matched_videos,
                velocity: velocity.to_string(),
                velocity_reason: None,
                total_content,
            }
        })
        .collect();

    EnrichmentPayload {
        updated_at: now,
        count: enriched.len(),
        promises: enriched,
    }
}

/// Ask the model to second-guess the count-based velocity tiers using the
/// actual headlines. Any failure leaves the heuristic tiers in place.
pub async fn refine_velocities(
    client: &reqwest::Client,
    api_key: &str,
    payload: &mut EnrichmentPayload,
) -> Result<()> {
    if payload.promises.is_empty() {
        return Ok(());
    }
    let prompt = build_velocity_prompt(&payload.promises);
    let reply = llm::chat(client, api_key, &prompt).await?;
    match llm::extract_json(&reply) {
        Some(value) => apply_velocities(&mut payload.promises, &value),
        None => warn!("velocity refinement reply carried no JSON, keeping heuristics"),
    }
    Ok(())
}

fn build_velocity_prompt(promises: &[PromiseEnrichment]) -> String {
    let mut prompt = String::from(
        "You are tracking momentum on NYC mayoral campaign promises. For each \
         promise below, rate its current velocity as \"high\", \"medium\", or \
         \"low\" based on the coverage listed.\n\n",
    );
    for promise in promises {
        prompt.push_str(&format!(
            "Promise {}: {} ({} related items)\n",
            promise.id, promise.title, promise.total_content
        ));
        for item in &promise.news {
            prompt.push_str(&format!("- News: {}\n", item.title));
        }
        for video in &promise.videos {
            prompt.push_str(&format!("- Video: {}\n", video.title));
        }
    }
    prompt.push_str(
        "\nRespond with JSON only, no other text: \
         {\"velocities\": [{\"promiseId\": \"...\", \"level\": \"high|medium|low\", \
         \"reason\": \"one sentence\"}]}",
    );
    prompt
}

fn apply_velocities(promises: &mut [PromiseEnrichment], value: &Value) {
    let Some(velocities) = value.get("velocities").and_then(Value::as_array) else {
        return;
    };
    for entry in velocities {
        let Some(id) = entry.get("promiseId").and_then(Value::as_str) else {
            continue;
        };
        let Some(promise) = promises.iter_mut().find(|p| p.id == id) else {
            continue;
        };
        if let Some(level) = entry.get("level").and_then(Value::as_str) {
            if matches!(level, "high" | "medium" | "low") {
                promise.velocity = level.to_string();
            }
        }
        if let Some(reason) = entry.get("reason").and_then(Value::as_str) {
            promise.velocity_reason = Some(reason.to_string());
        }
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
    fn extracts_areas_with_excerpts() {
        let markdown = "\
# Platform

## Housing
Our rent freeze will protect every stabilized tenant.
No exceptions, starting day one.

## Buses
Every bus in this city will be fare-free.
";
        let promises = extract_promises(markdown);
        let ids: Vec<&str> = promises.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"housing"));
        assert!(ids.contains(&"transit"));
        let housing = promises.iter().find(|p| p.id == "housing").unwrap();
        assert!(housing.excerpt.contains("rent freeze"));
        assert!(housing.keywords_found.contains(&"rent freeze".to_string()));
    }

    #[test]
    fn empty_page_uses_fallback_positions() {
        let promises = extract_promises("nothing relevant here");
        assert_eq!(promises.len(), 6);
        assert!(promises.iter().any(|p| p.id == "rent-freeze"));
        assert!(promises.iter().all(|p| !p.excerpt.is_empty()));
    }

    #[test]
    fn completion_requires_phrases_in_related_items() {
        let promises = fallback_promises();
        let news = vec![
            NewsItem {
                title: "Rent freeze signed into law".to_string(),
                description: "The freeze the rent plan was enacted and approved.".to_string(),
                source: "gothamist.com".to_string(),
                url: "https://gothamist.com/a".to_string(),
                ..Default::default()
            },
            NewsItem {
                title: "Yankees win".to_string(),
                description: "passed, enacted, launched".to_string(),
                ..Default::default()
            },
        ];
        let summary = analyze_completion(&promises, &news, &[], now());
        assert_eq!(summary.total, 6);
        assert_eq!(summary.completed, 1);
        let done = &summary.completed_promises[0];
        assert_eq!(done.id, "rent-freeze");
        assert!(done.score >= 3);
        assert_eq!(done.evidence.len(), 1);
        // Unrelated completion language counts for nothing.
        assert!(summary
            .in_progress_promises
            .iter()
            .all(|p| p.status == "in_progress"));
    }

    #[test]
    fn in_progress_confidence_tiers() {
        let promises = vec![Promise {
            id: "fare-free".to_string(),
            title: "Fare-Free Buses".to_string(),
            keywords_found: vec!["fare-free".to_string()],
            ..Default::default()
        }];
        let news = vec![NewsItem {
            title: "Fare-free buses pilot launched on five routes".to_string(),
            ..Default::default()
        }];
        let summary = analyze_completion(&promises, &news, &[], now());
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.in_progress_promises[0].confidence, "medium");

        let quiet = analyze_completion(&promises, &[], &[], now());
        assert_eq!(quiet.in_progress_promises[0].confidence, "low");
    }

    #[test]
    fn enrichment_matches_markets_and_tiers_velocity() {
        let promises = fallback_promises();
        let markets = vec![
            Market {
                id: "1".to_string(),
                title: "Unrelated".to_string(),
                slug: "will-mamdani-freeze-nyc-rents-before-2027".to_string(),
                ..Default::default()
            },
            Market {
                id: "KXNYCFREEBUS-27MAR31".to_string(),
                title: "Unrelated too".to_string(),
                slug: "x".to_string(),
                ..Default::default()
            },
        ];
        let news: Vec<NewsItem> = (0..5)
            .map(|i| NewsItem {
                title: format!("Rent stabilization update {i}"),
                ..Default::default()
            })
            .collect();

        let payload = enrich_promises(&promises, &markets, &news, &[], now());
        let rent = payload.promises.iter().find(|p| p.id == "rent-freeze").unwrap();
        assert_eq!(rent.markets.len(), 1);
        assert_eq!(rent.markets[0].slug, "will-mamdani-freeze-nyc-rents-before-2027");
        assert_eq!(rent.news.len(), 5);
        assert_eq!(rent.velocity, "high");

        let bus = payload.promises.iter().find(|p| p.id == "fare-free").unwrap();
        assert_eq!(bus.markets.len(), 1);
        assert_eq!(bus.markets[0].id, "KXNYCFREEBUS-27MAR31");
        assert_eq!(bus.velocity, "low");
    }

    #[test]
    fn velocity_merge_ignores_junk() {
        let mut promises = vec![PromiseEnrichment {
            id: "rent-freeze".to_string(),
            title: "Freeze the Rent".to_string(),
            icon: "🏠".to_string(),
            markets: Vec::new(),
            news: Vec::new(),
            videos: Vec::new(),
            velocity: "low".to_string(),
            velocity_reason: None,
            total_content: 0,
        }];
        let reply = json!({"velocities": [
            {"promiseId": "rent-freeze", "level": "high", "reason": "Heavy coverage"},
            {"promiseId": "unknown", "level": "medium"},
            {"promiseId": "rent-freeze", "level": "extreme"}
        ]});
        apply_velocities(&mut promises, &reply);
        assert_eq!(promises[0].velocity, "high");
        assert_eq!(promises[0].velocity_reason.as_deref(), Some("Heavy coverage"));
    }
}
