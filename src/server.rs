//! Dashboard HTTP API.
//!
//! Read endpoints never fail the frontend: upstream trouble is logged and
//! answered with a 200 fallback payload (`updatedAt`, an `error` string,
//! and empty collections) so panels degrade to empty instead of erroring.
//! Write endpoints (cron-invoked) do report 4xx/5xx.

use std::sync::Arc;

use anyhow::Result;
use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::alerts;
use crate::cache::DailyCache;
use crate::config::{AppConfig, Secrets};
use crate::newsletter::{Newsletter, SubscribeOutcome};
use crate::promises;
use crate::sources::{firecrawl, github, kalshi, llm, polymarket, socrata, virlo};
use crate::store::Store;
use crate::types::{Market, MarketsPayload, NewsItem, Promise, VideoItem};

pub struct AppState {
    pub config: AppConfig,
    pub secrets: Secrets,
    pub http: Client,
    pub alert_cache: DailyCache<Value>,
}

type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, secrets: Secrets) -> Result<Self> {
        let http = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config,
            secrets,
            http,
            alert_cache: DailyCache::new(),
        })
    }

    fn store(&self) -> Option<Store> {
        let url = self.secrets.supabase_url.as_deref()?;
        let key = self.secrets.supabase_key.as_deref()?;
        Some(Store::new(self.http.clone(), url, key))
    }

    fn newsletter(&self) -> Option<Newsletter> {
        let key = self.secrets.buttondown_api_key.as_deref()?;
        Some(Newsletter::new(self.http.clone(), key))
    }
}

pub fn build_router(state: SharedState) -> axum::Router {
    axum::Router::new()
        .route("/healthz", get(healthz))
        .route("/api/changelog", get(changelog))
        .route("/api/polymarket", get(polymarket_feed))
        .route("/api/kalshi", get(kalshi_feed))
        .route("/api/trends", get(trends))
        .route("/api/videos", get(videos))
        .route("/api/news", get(news))
        .route("/api/platform-promises", get(platform_promises))
        .route("/api/nyc-311", get(nyc_311))
        .route("/api/nyc-budget", get(nyc_budget))
        .route("/api/nyc-legislation", get(nyc_legislation))
        .route("/api/nyc-mmr", get(nyc_mmr))
        .route("/api/subscribe", post(subscribe))
        .route("/api/save-market-snapshot", post(save_market_snapshot))
        .route("/api/check-breaking-alerts", post(check_breaking_alerts))
        .route("/api/notable-alerts", post(notable_alerts))
        .route("/api/promise-completion", post(promise_completion))
        .route("/api/promise-enrichment", post(promise_enrichment))
        .route("/api/send-weekly-digest", post(send_weekly_digest))
        .with_state(state)
}

/// Bind and run the API until the process is stopped.
pub async fn serve(state: SharedState) -> Result<()> {
    let bind = state.config.server.bind.clone();
    let listener = TcpListener::bind(&bind).await?;
    info!("dashboard API listening on {bind}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// CDN cache policy for a read endpoint.
fn cached(seconds: u32) -> [(header::HeaderName, String); 1] {
    [(
        header::CACHE_CONTROL,
        format!("s-maxage={seconds}, stale-while-revalidate"),
    )]
}

fn credential_missing(name: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": format!("{name} not configured")})),
    )
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Read endpoints ─────────────────────────────────────────────

async fn changelog(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match github::fetch_commits(&state.http, &state.config.watch.github_repo).await
    {
        Ok(commits) => github::normalize_commits(&commits, now),
        Err(e) => {
            warn!("changelog fetch failed: {e:#}");
            github::ChangelogPayload::fallback(e.to_string(), now)
        }
    };
    (cached(300), Json(payload))
}

async fn polymarket_feed(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let markets = polymarket::gather_markets(&state.http, &state.config.watch).await;
    (cached(120), Json(MarketsPayload::new(markets, now)))
}

async fn kalshi_feed(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let markets = kalshi::gather_markets(&state.http, &state.config.watch).await;
    (cached(120), Json(MarketsPayload::new(markets, now)))
}

async fn trends(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match &state.secrets.virlo_api_key {
        Some(key) => match virlo::fetch_trends(&state.http, key).await {
            Ok(digest) => virlo::normalize_trends(&digest, &state.config.watch.keywords, now),
            Err(e) => {
                warn!("trends fetch failed: {e:#}");
                virlo::TrendsPayload::fallback(e.to_string(), now)
            }
        },
        None => virlo::TrendsPayload::fallback("VIRLO_API_KEY not configured", now),
    };
    (cached(60), Json(payload))
}

async fn videos(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match fetch_watched_videos(&state).await {
        Ok(Some(body)) => virlo::normalize_videos(&body, now),
        Ok(None) => virlo::VideosPayload::fallback("no matching video collection", now),
        Err(e) => {
            warn!("videos fetch failed: {e:#}");
            virlo::VideosPayload::fallback(e.to_string(), now)
        }
    };
    (cached(300), Json(payload))
}

/// Resolve the watched comet and pull its videos. `Ok(None)` means the
/// credential is missing or no comet matched.
async fn fetch_watched_videos(state: &AppState) -> Result<Option<Value>> {
    let Some(key) = state.secrets.virlo_api_key.as_deref() else {
        return Ok(None);
    };
    let Some(comet_id) =
        virlo::find_comet(&state.http, key, &state.config.watch.comet_names).await?
    else {
        return Ok(None);
    };
    let body = virlo::fetch_comet_videos(&state.http, key, &comet_id).await?;
    Ok(Some(body))
}

async fn news(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match &state.secrets.firecrawl_api_key {
        Some(key) => {
            match firecrawl::search(&state.http, key, &state.config.watch.news_query).await {
                Ok(body) => firecrawl::normalize_search(&body, now),
                Err(e) => {
                    warn!("news search failed: {e:#}");
                    firecrawl::NewsPayload::fallback(e.to_string(), now)
                }
            }
        }
        None => firecrawl::NewsPayload::fallback("FIRECRAWL_API_KEY not configured", now),
    };
    (cached(300), Json(payload))
}

async fn platform_promises(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let (promises, error) = match &state.secrets.firecrawl_api_key {
        Some(key) => {
            match firecrawl::scrape(&state.http, key, &state.config.watch.platform_url).await {
                Ok(markdown) => (promises::extract_promises(&markdown), None),
                Err(e) => {
                    warn!("platform scrape failed: {e:#}");
                    (promises::fallback_promises(), Some(e.to_string()))
                }
            }
        }
        None => (
            promises::fallback_promises(),
            Some("FIRECRAWL_API_KEY not configured".to_string()),
        ),
    };
    let mut payload = json!({
        "updatedAt": now,
        "promises": promises,
        "count": promises.len(),
        "source": "platform",
    });
    if let Some(error) = error {
        payload["error"] = json!(error);
    }
    (cached(3600), Json(payload))
}

async fn nyc_311(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match socrata::fetch_311(&state.http, now).await {
        Ok((aggregated, recent)) => socrata::normalize_311(&aggregated, &recent, now),
        Err(e) => {
            warn!("311 fetch failed: {e:#}");
            socrata::ServiceRequestsPayload::fallback(e.to_string(), now)
        }
    };
    (cached(1800), Json(payload))
}

async fn nyc_budget(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match socrata::fetch_budget(&state.http).await {
        Ok(rows) => socrata::normalize_budget(&rows, now),
        Err(e) => {
            warn!("budget fetch failed: {e:#}");
            socrata::BudgetPayload::fallback(e.to_string(), now)
        }
    };
    (cached(3600), Json(payload))
}

async fn nyc_legislation(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match socrata::fetch_legislation(&state.http).await {
        Ok(rows) => socrata::normalize_legislation(&rows, now),
        Err(e) => {
            warn!("legislation fetch failed: {e:#}");
            socrata::LegislationPayload::fallback(e.to_string(), now)
        }
    };
    (cached(3600), Json(payload))
}

async fn nyc_mmr(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now();
    let payload = match socrata::fetch_mmr(&state.http).await {
        Ok(rows) => socrata::normalize_mmr(&rows, now),
        Err(e) => {
            warn!("MMR fetch failed: {e:#}");
            socrata::MmrPayload::fallback(e.to_string(), now)
        }
    };
    (cached(3600), Json(payload))
}

// ── Write endpoints ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    email: String,
}

async fn subscribe(
    State(state): State<SharedState>,
    Json(request): Json<SubscribeRequest>,
) -> impl IntoResponse {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "valid email required"})),
        );
    }
    let Some(newsletter) = state.newsletter() else {
        return credential_missing("BUTTONDOWN_API_KEY");
    };

    let tags = [
        state.config.alerts.breaking_tag.as_str(),
        state.config.alerts.digest_tag.as_str(),
    ];
    match newsletter.subscribe(email, &tags).await {
        Ok(SubscribeOutcome::Subscribed) => (
            StatusCode::OK,
            Json(json!({"success": true, "status": "subscribed"})),
        ),
        Ok(SubscribeOutcome::AlreadySubscribed) => (
            StatusCode::OK,
            Json(json!({"success": true, "status": "already_subscribed"})),
        ),
        Err(e) => {
            warn!("subscribe failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "subscription failed"})),
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotRequest {
    #[serde(default)]
    markets: Vec<Market>,
}

/// Posted context for the notable-alerts pass. Every field is optional;
/// the scheduler posts whatever feeds it has.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AlertContextRequest {
    videos: Vec<VideoItem>,
    news: Vec<NewsItem>,
    markets: Vec<Market>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromiseCompletionRequest {
    promises: Vec<Promise>,
    news: Vec<NewsItem>,
    videos: Vec<VideoItem>,
}

/// Posted context for enrichment. The two market feeds arrive as separate
/// arrays, mirroring how the scheduler collects them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromiseEnrichmentRequest {
    promises: Vec<Promise>,
    markets: Vec<Market>,
    kalshi_markets: Vec<Market>,
    news: Vec<NewsItem>,
    videos: Vec<VideoItem>,
}

async fn save_market_snapshot(
    State(state): State<SharedState>,
    Json(request): Json<SnapshotRequest>,
) -> impl IntoResponse {
    if request.markets.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "markets array required"})),
        );
    }
    let Some(store) = state.store() else {
        return credential_missing("SUPABASE_URL/SUPABASE_KEY");
    };
    match store.save_snapshots(&request.markets).await {
        Ok(saved) => (StatusCode::OK, Json(json!({"success": true, "saved": saved}))),
        Err(e) => {
            warn!("snapshot save failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "snapshot save failed"})),
            )
        }
    }
}

async fn check_breaking_alerts(
    State(state): State<SharedState>,
    Json(request): Json<SnapshotRequest>,
) -> impl IntoResponse {
    let Some(store) = state.store() else {
        return credential_missing("SUPABASE_URL/SUPABASE_KEY");
    };
    let Some(newsletter) = state.newsletter() else {
        return credential_missing("BUTTONDOWN_API_KEY");
    };
    if request.markets.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "markets array required"})),
        );
    }

    let now = Utc::now();
    match alerts::run_breaking_check(
        &store,
        &newsletter,
        &request.markets,
        &state.config.alerts,
        now,
    )
    .await
    {
        Ok(sent) => (
            StatusCode::OK,
            Json(json!({"success": true, "checked": request.markets.len(), "sent": sent})),
        ),
        Err(e) => {
            warn!("breaking check failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "breaking check failed"})),
            )
        }
    }
}

async fn notable_alerts(
    State(state): State<SharedState>,
    body: Option<Json<AlertContextRequest>>,
) -> impl IntoResponse {
    let now = Utc::now();
    let today = now.date_naive();
    if let Some(mut cached) = state.alert_cache.get(today) {
        cached["cached"] = json!(true);
        return (StatusCode::OK, Json(cached));
    }
    let Some(api_key) = state.secrets.anthropic_api_key.clone() else {
        return credential_missing("ANTHROPIC_API_KEY");
    };

    let Json(context) = body.unwrap_or_default();
    let prompt = alerts::build_alert_prompt(&context.videos, &context.news, &context.markets);
    let reply = match llm::chat(&state.http, &api_key, &prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("alert generation failed: {e:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "alert generation failed"})),
            );
        }
    };
    let mut generated = alerts::parse_alerts(&reply);
    alerts::enrich_alerts_with_urls(&mut generated, &context.news, &context.videos);

    // Archive for the weekly digest; the response does not wait on it.
    if let Some(store) = state.store() {
        let to_save = generated.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert_notable_alerts(&to_save).await {
                warn!("notable alert archive failed: {e:#}");
            }
        });
    }

    let payload = json!({
        "updatedAt": now,
        "alerts": generated,
        "count": generated.len(),
        "cached": false,
    });
    state.alert_cache.store(today, payload.clone());
    (StatusCode::OK, Json(payload))
}

async fn promise_completion(
    body: Option<Json<PromiseCompletionRequest>>,
) -> impl IntoResponse {
    let now = Utc::now();
    let Json(request) = body.unwrap_or_default();
    let summary =
        promises::analyze_completion(&request.promises, &request.news, &request.videos, now);
    (StatusCode::OK, Json(json!(summary)))
}

async fn promise_enrichment(
    State(state): State<SharedState>,
    body: Option<Json<PromiseEnrichmentRequest>>,
) -> impl IntoResponse {
    let now = Utc::now();
    let Json(request) = body.unwrap_or_default();
    let mut markets = request.markets;
    markets.extend(request.kalshi_markets);

    let mut payload = promises::enrich_promises(
        &request.promises,
        &markets,
        &request.news,
        &request.videos,
        now,
    );
    if let Some(key) = state.secrets.anthropic_api_key.as_deref() {
        if let Err(e) = promises::refine_velocities(&state.http, key, &mut payload).await {
            warn!("velocity refinement failed, keeping heuristics: {e:#}");
        }
    }
    (StatusCode::OK, Json(json!(payload)))
}

async fn send_weekly_digest(State(state): State<SharedState>) -> impl IntoResponse {
    let Some(store) = state.store() else {
        return credential_missing("SUPABASE_URL/SUPABASE_KEY");
    };
    let Some(newsletter) = state.newsletter() else {
        return credential_missing("BUTTONDOWN_API_KEY");
    };

    match alerts::run_weekly_digest(&store, &newsletter, &state.config.alerts, Utc::now()).await
    {
        Ok(0) => (
            StatusCode::OK,
            Json(json!({"success": true, "skipped": true, "reason": "no unsent alerts"})),
        ),
        Ok(count) => (
            StatusCode::OK,
            Json(json!({"success": true, "alerts": count})),
        ),
        Err(e) => {
            warn!("weekly digest failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "weekly digest failed"})),
            )
        }
    }
}
