pub mod alerts;
pub mod cache;
pub mod config;
pub mod newsletter;
pub mod promises;
pub mod server;
pub mod sources;
pub mod store;
pub mod text;
pub mod types;

/// Polymarket Gamma API base URL (public, no auth required)
pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

/// Kalshi Elections API base URL (public market data)
pub const KALSHI_API_BASE: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// GitHub REST API base URL
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// NYC Open Data (Socrata) resource base URL
pub const NYC_OPEN_DATA_BASE: &str = "https://data.cityofnewyork.us/resource";

/// Anthropic messages API endpoint
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Buttondown newsletter API base URL
pub const BUTTONDOWN_API_BASE: &str = "https://api.buttondown.email/v1";

/// Virlo social-video trends API base URL
pub const VIRLO_API_BASE: &str = "https://api.virlo.ai";

/// Firecrawl search/scrape API base URL
pub const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev/v1";

/// User-Agent for upstream calls that require one (GitHub rejects requests
/// without it).
pub const USER_AGENT: &str = concat!("civicdash/", env!("CARGO_PKG_VERSION"));
