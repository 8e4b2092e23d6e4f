use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind the dashboard API to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// The subject being monitored: which repo, markets, and keywords the
/// dashboard tracks. Defaults are the production watch lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// GitHub `owner/repo` whose commit history feeds the changelog panel.
    #[serde(default = "default_github_repo")]
    pub github_repo: String,
    /// Case-insensitive relevance terms for market/trend sweeps.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Curated Polymarket Gamma event slugs fetched directly.
    #[serde(default = "default_polymarket_slugs")]
    pub polymarket_slugs: Vec<String>,
    /// Curated Kalshi market tickers fetched directly.
    #[serde(default = "default_kalshi_tickers")]
    pub kalshi_tickers: Vec<String>,
    /// Ticker prefixes scanned for when paginating the full Kalshi book.
    #[serde(default = "default_kalshi_prefixes")]
    pub kalshi_ticker_prefixes: Vec<String>,
    /// Query sent to the web-search API for the news panel.
    #[serde(default = "default_news_query")]
    pub news_query: String,
    /// Campaign platform page scraped for promise extraction.
    #[serde(default = "default_platform_url")]
    pub platform_url: String,
    /// Name fragments identifying the social-video collection to read.
    /// Existing collections only; the dashboard never creates one.
    #[serde(default = "default_comet_names")]
    pub comet_names: Vec<String>,
}

/// Breaking-alert and digest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Fractional price move that triggers a breaking alert (0.10 = 10%).
    #[serde(default = "default_price_change_threshold")]
    pub price_change_threshold: f64,
    /// How far back to look for the comparison price.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Newsletter tag receiving breaking alerts.
    #[serde(default = "default_breaking_tag")]
    pub breaking_tag: String,
    /// Newsletter tag receiving the weekly digest.
    #[serde(default = "default_digest_tag")]
    pub digest_tag: String,
    /// Display name used in email copy.
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Public site URL used in email copy.
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

fn default_github_repo() -> String {
    "VirloGit/monitormamdani".into()
}

fn default_keywords() -> Vec<String> {
    [
        "mamdani",
        "zohran",
        "nyc mayor",
        "new york mayor",
        "rent freeze",
        "free bus",
    ]
    .map(String::from)
    .to_vec()
}

fn default_polymarket_slugs() -> Vec<String> {
    [
        "will-mamdani-freeze-nyc-rents-before-2027",
        "mamdani-opens-city-owned-grocery-store-by-june-30",
        "will-mamdani-make-nyc-buses-free-by-march-31",
        "zohran-mamdani-out-as-mayor-of-nyc-before-2027",
        "will-mamdani-pass-the-2-millionaire-tax-before-2027",
        "zohran-mamdani-citizenship-revoked-before-2027",
        "will-mamdani-raise-the-minimum-wage-to-30-before-2027",
    ]
    .map(String::from)
    .to_vec()
}

fn default_kalshi_tickers() -> Vec<String> {
    [
        "KXPERSONPRESMAM-45",
        "KXNYCCORPORATETAX-27JAN01",
        "KXNYCCHILDCARE-27JAN01",
        "KXNYCTAXMILLIONS-27JAN01",
        "KXNYCFREEBUS-27MAR31",
        "KXNYCRENTFREEZE-27JAN01",
        "KXNYCGROCERY-26JUN30",
        "KXNYCMINWAGE-27JAN01",
    ]
    .map(String::from)
    .to_vec()
}

fn default_kalshi_prefixes() -> Vec<String> {
    ["KXNYC", "KXPERSONPRESMAM", "MAM"].map(String::from).to_vec()
}

fn default_news_query() -> String {
    "Zohran Mamdani NYC mayor campaign 2025".into()
}

fn default_platform_url() -> String {
    "https://www.zohranfornyc.com/platform".into()
}

fn default_comet_names() -> Vec<String> {
    ["mamdani", "monitor"].map(String::from).to_vec()
}

fn default_price_change_threshold() -> f64 {
    0.10
}

fn default_lookback_hours() -> i64 {
    1
}

fn default_breaking_tag() -> String {
    "breaking_alerts".into()
}

fn default_digest_tag() -> String {
    "weekly_digest".into()
}

fn default_site_name() -> String {
    "Monitor Mamdani".into()
}

fn default_site_url() -> String {
    "https://monitormamdani.com".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            github_repo: default_github_repo(),
            keywords: default_keywords(),
            polymarket_slugs: default_polymarket_slugs(),
            kalshi_tickers: default_kalshi_tickers(),
            kalshi_ticker_prefixes: default_kalshi_prefixes(),
            news_query: default_news_query(),
            platform_url: default_platform_url(),
            comet_names: default_comet_names(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            price_change_threshold: default_price_change_threshold(),
            lookback_hours: default_lookback_hours(),
            breaking_tag: default_breaking_tag(),
            digest_tag: default_digest_tag(),
            site_name: default_site_name(),
            site_url: default_site_url(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Upstream credentials, read once at startup. All optional: endpoints that
/// need a missing credential degrade instead of blocking startup.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub buttondown_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub virlo_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            supabase_url: non_empty_var("SUPABASE_URL"),
            supabase_key: non_empty_var("SUPABASE_KEY"),
            buttondown_api_key: non_empty_var("BUTTONDOWN_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            virlo_api_key: non_empty_var("VIRLO_API_KEY"),
            firecrawl_api_key: non_empty_var("FIRECRAWL_API_KEY"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!((config.alerts.price_change_threshold - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.alerts.lookback_hours, 1);
        assert!(!config.watch.keywords.is_empty());
        assert!(!config.watch.polymarket_slugs.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [alerts]
            price_change_threshold = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!((config.alerts.price_change_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.alerts.breaking_tag, "breaking_alerts");
        assert_eq!(config.watch.github_repo, "VirloGit/monitormamdani");
    }
}
