use std::env::VarError;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::{
    AppConfig, ClassifierSettings, DefaultAvatars, DiscoverySettings, Environment, LocaleTags,
    PacingSettings, ScraperSettings, StoreBackend, TrendSettings,
};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required values are missing or invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match optional(var) {
            None => Ok(default),
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        }
    };

    // Only ingest talks to Apify; db, keywords and trend commands run without it.
    let apify_token = optional("APIFY_TOKEN");

    let env = parse_environment(&or_default("SNSDB_ENV", "development"));
    let log_level = or_default("SNSDB_LOG_LEVEL", "info");
    let keywords_path = PathBuf::from(or_default("SNSDB_KEYWORDS_PATH", "./config/keywords.yaml"));
    let cycle_state_dir = PathBuf::from(or_default("SNSDB_CYCLE_STATE_DIR", "."));
    let keywords_per_run: usize = parse_var(&lookup, "SNSDB_KEYWORDS_PER_RUN", "5")?;

    let store_backend = parse_store_backend(&or_default("SNSDB_STORE_BACKEND", "rest"))?;
    let supabase_url = optional("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());
    let supabase_service_role_key = optional("SUPABASE_SERVICE_ROLE_KEY");
    let database_url = optional("DATABASE_URL");

    match store_backend {
        StoreBackend::Rest => {
            if supabase_url.is_none() {
                return Err(ConfigError::MissingEnvVar("SUPABASE_URL".to_string()));
            }
            if supabase_service_role_key.is_none() {
                return Err(ConfigError::MissingEnvVar(
                    "SUPABASE_SERVICE_ROLE_KEY".to_string(),
                ));
            }
        }
        StoreBackend::Postgres => {
            if database_url.is_none() {
                return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
            }
        }
    }

    let db_max_connections: u32 = parse_var(&lookup, "SNSDB_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections: u32 = parse_var(&lookup, "SNSDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs: u64 = parse_var(&lookup, "SNSDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let store_timeout_secs: u64 = parse_var(&lookup, "SNSDB_STORE_TIMEOUT_SECS", "60")?;
    let image_timeout_secs: u64 = parse_var(&lookup, "SNSDB_IMAGE_TIMEOUT_SECS", "30")?;
    let profile_image_bucket = or_default("SNSDB_PROFILE_IMAGE_BUCKET", "profile_images");

    let locale = LocaleTags {
        country: or_default("SNSDB_COUNTRY", "JP"),
        language: or_default("SNSDB_LANGUAGE", "ja"),
    };

    let classifier = ClassifierSettings {
        min_followers: parse_var(&lookup, "SNSDB_MIN_FOLLOWERS", "10000")?,
        locale_strict: parse_bool("SNSDB_LOCALE_STRICT", true)?,
        influencer_strict: parse_bool("SNSDB_INFLUENCER_STRICT", false)?,
    };

    let discovery = DiscoverySettings {
        min_candidates_per_keyword: parse_var(&lookup, "SNSDB_MIN_CANDIDATES_PER_KEYWORD", "50")?,
        stale_days: parse_var(&lookup, "SNSDB_DISCOVERY_STALE_DAYS", "7")?,
        max_candidates_fetch: parse_var(&lookup, "SNSDB_MAX_CANDIDATES_FETCH", "300")?,
        posts_refresh_hours: parse_var(&lookup, "SNSDB_POSTS_REFRESH_HOURS", "12")?,
    };

    let trend = TrendSettings {
        high_followers_threshold: parse_var(&lookup, "SNSDB_HIGH_FOLLOWERS_THRESHOLD", "100000")?,
        window_days: parse_var(&lookup, "SNSDB_TREND_DAYS", "3")?,
        min_daily_growth_abs: parse_var(&lookup, "SNSDB_MIN_DAILY_GROWTH_ABS", "500")?,
        min_daily_growth_pct: parse_var(&lookup, "SNSDB_MIN_DAILY_GROWTH_PCT", "0.5")?,
    };

    let scraper = ScraperSettings {
        base_url: or_default("APIFY_BASE_URL", "https://api.apify.com/v2")
            .trim_end_matches('/')
            .to_string(),
        timeout_secs: parse_var(&lookup, "SNSDB_APIFY_TIMEOUT_SECS", "300")?,
        poll_interval_secs: parse_var(&lookup, "SNSDB_APIFY_POLL_INTERVAL_SECS", "5")?,
        max_polls: parse_var(&lookup, "SNSDB_APIFY_MAX_POLLS", "120")?,
        search_limit: parse_var(&lookup, "SNSDB_SEARCH_LIMIT", "50")?,
        posts_limit: parse_var(&lookup, "SNSDB_POSTS_LIMIT", "50")?,
        tiktok_max_items: parse_var(&lookup, "SNSDB_TIKTOK_MAX_ITEMS", "120")?,
        tiktok_proxy_country: or_default("SNSDB_TIKTOK_PROXY_COUNTRY", "JP"),
        x_max_items: parse_var(&lookup, "SNSDB_X_MAX_ITEMS", "300")?,
        x_language: or_default("SNSDB_X_LANGUAGE", "ja"),
        x_sort: or_default("SNSDB_X_SORT", "Latest"),
        max_posts_per_author: parse_var(&lookup, "SNSDB_MAX_POSTS_PER_AUTHOR", "50")?,
    };

    let fallback = DefaultAvatars::default();
    let default_avatars = DefaultAvatars {
        instagram: or_default("SNSDB_DEFAULT_AVATAR_INSTAGRAM", &fallback.instagram),
        tiktok: or_default("SNSDB_DEFAULT_AVATAR_TIKTOK", &fallback.tiktok),
        x: or_default("SNSDB_DEFAULT_AVATAR_X", &fallback.x),
    };

    let pacing = PacingSettings {
        account_write_delay_ms: parse_var(&lookup, "SNSDB_ACCOUNT_WRITE_DELAY_MS", "200")?,
        posts_delay_ms: parse_var(&lookup, "SNSDB_POSTS_DELAY_MS", "500")?,
    };

    let ingest_cron = or_default("SNSDB_INGEST_CRON", "0 0 */6 * * *");

    let config = AppConfig {
        env,
        log_level,
        keywords_path,
        cycle_state_dir,
        keywords_per_run,
        apify_token,
        store_backend,
        supabase_url,
        supabase_service_role_key,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        store_timeout_secs,
        image_timeout_secs,
        profile_image_bucket,
        locale,
        classifier,
        discovery,
        trend,
        scraper,
        default_avatars,
        pacing,
        ingest_cron,
    };

    validate(&config)?;
    Ok(config)
}

fn parse_var<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = lookup(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.keywords_per_run == 0 {
        return Err(ConfigError::Validation(
            "SNSDB_KEYWORDS_PER_RUN must be at least 1".to_string(),
        ));
    }
    if config.db_min_connections > config.db_max_connections {
        return Err(ConfigError::Validation(format!(
            "SNSDB_DB_MIN_CONNECTIONS ({}) exceeds SNSDB_DB_MAX_CONNECTIONS ({})",
            config.db_min_connections, config.db_max_connections
        )));
    }
    let pct = config.trend.min_daily_growth_pct;
    if !pct.is_finite() || pct < 0.0 {
        return Err(ConfigError::Validation(format!(
            "SNSDB_MIN_DAILY_GROWTH_PCT must be a non-negative number, got {pct}"
        )));
    }
    if config.discovery.stale_days < 0 || config.discovery.posts_refresh_hours < 0 {
        return Err(ConfigError::Validation(
            "staleness windows must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_store_backend(s: &str) -> Result<StoreBackend, ConfigError> {
    match s.to_lowercase().as_str() {
        "rest" | "supabase" | "postgrest" => Ok(StoreBackend::Rest),
        "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SNSDB_STORE_BACKEND".to_string(),
            reason: format!("expected 'rest' or 'postgres', got '{other}'"),
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
