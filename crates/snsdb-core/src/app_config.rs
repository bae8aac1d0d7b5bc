use std::path::PathBuf;

use crate::{ConfigError, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which persistence transport backs the `Store` collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Supabase / `PostgREST` over HTTPS.
    Rest,
    /// Direct Postgres connection through sqlx.
    Postgres,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Rest => write!(f, "rest"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}

/// Locale tags stamped onto every persisted account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleTags {
    pub country: String,
    pub language: String,
}

impl Default for LocaleTags {
    fn default() -> Self {
        Self {
            country: "JP".to_string(),
            language: "ja".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Hard follower floor; nothing below it is ever persisted.
    pub min_followers: i64,
    /// Require Japanese script in the display name or biography.
    pub locale_strict: bool,
    /// Require a positive person signal and reject business accounts.
    pub influencer_strict: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            min_followers: 10_000,
            locale_strict: true,
            influencer_strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub min_candidates_per_keyword: usize,
    pub stale_days: i64,
    pub max_candidates_fetch: usize,
    pub posts_refresh_hours: i64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            min_candidates_per_keyword: 50,
            stale_days: 7,
            max_candidates_fetch: 300,
            posts_refresh_hours: 12,
        }
    }
}

/// Tuning constants for the follower-growth trend rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSettings {
    pub high_followers_threshold: i64,
    /// Number of day-over-day deltas inspected; the series needs one more point.
    pub window_days: usize,
    pub min_daily_growth_abs: i64,
    /// Percent, not a fraction: `0.5` means half a percent.
    pub min_daily_growth_pct: f64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            high_followers_threshold: 100_000,
            window_days: 3,
            min_daily_growth_abs: 500,
            min_daily_growth_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub search_limit: u32,
    pub posts_limit: u32,
    pub tiktok_max_items: u32,
    pub tiktok_proxy_country: String,
    pub x_max_items: u32,
    pub x_language: String,
    pub x_sort: String,
    pub max_posts_per_author: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com/v2".to_string(),
            timeout_secs: 300,
            poll_interval_secs: 5,
            max_polls: 120,
            search_limit: 50,
            posts_limit: 50,
            tiktok_max_items: 120,
            tiktok_proxy_country: "JP".to_string(),
            x_max_items: 300,
            x_language: "ja".to_string(),
            x_sort: "Latest".to_string(),
            max_posts_per_author: 50,
        }
    }
}

/// Fallback avatar URL persisted when no durable copy can be made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAvatars {
    pub instagram: String,
    pub tiktok: String,
    pub x: String,
}

impl DefaultAvatars {
    #[must_use]
    pub fn for_platform(&self, platform: Platform) -> &str {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Tiktok => &self.tiktok,
            Platform::X => &self.x,
        }
    }
}

impl Default for DefaultAvatars {
    fn default() -> Self {
        Self {
            instagram: "https://www.instagram.com/favicon.ico".to_string(),
            tiktok: "https://www.tiktok.com/favicon.ico".to_string(),
            x: "https://abs.twimg.com/sticky/default_profile_images/default_profile_normal.png"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSettings {
    pub account_write_delay_ms: u64,
    pub posts_delay_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            account_write_delay_ms: 200,
            posts_delay_ms: 500,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub keywords_path: PathBuf,
    pub cycle_state_dir: PathBuf,
    pub keywords_per_run: usize,
    pub apify_token: Option<String>,
    pub store_backend: StoreBackend,
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub profile_image_bucket: String,
    pub locale: LocaleTags,
    pub classifier: ClassifierSettings,
    pub discovery: DiscoverySettings,
    pub trend: TrendSettings,
    pub scraper: ScraperSettings,
    pub default_avatars: DefaultAvatars,
    pub pacing: PacingSettings,
    pub ingest_cron: String,
}

impl AppConfig {
    /// The Apify token, for commands that scrape.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `APIFY_TOKEN` was unset or blank.
    pub fn require_apify_token(&self) -> Result<&str, ConfigError> {
        self.apify_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("APIFY_TOKEN".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("keywords_path", &self.keywords_path)
            .field("cycle_state_dir", &self.cycle_state_dir)
            .field("keywords_per_run", &self.keywords_per_run)
            .field("apify_token", &self.apify_token.as_ref().map(|_| "[redacted]"))
            .field("store_backend", &self.store_backend)
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_service_role_key",
                &self.supabase_service_role_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("profile_image_bucket", &self.profile_image_bucket)
            .field("locale", &self.locale)
            .field("classifier", &self.classifier)
            .field("discovery", &self.discovery)
            .field("trend", &self.trend)
            .field("scraper", &self.scraper)
            .field("default_avatars", &self.default_avatars)
            .field("pacing", &self.pacing)
            .field("ingest_cron", &self.ingest_cron)
            .finish()
    }
}
