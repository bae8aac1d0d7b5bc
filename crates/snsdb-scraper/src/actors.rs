//! Apify actor selection and input payloads per platform.

use serde_json::{json, Value};
use snsdb_core::{Platform, ScraperSettings};

use crate::ScraperError;

const INSTAGRAM_ACTOR: &str = "apify~instagram-scraper";
const TIKTOK_ACTOR: &str = "clockworks~tiktok-scraper";
const X_ACTOR: &str = "apidojo~tweet-scraper";

/// TikTok's actor caps `resultsPerPage` at 100.
const TIKTOK_MAX_RESULTS_PER_PAGE: u32 = 100;

/// What the coordinator asks a scraper for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeQuery {
    /// Accounts matching a keyword (profile details).
    DiscoverProfiles { keyword: String, limit: u32 },
    /// Recent posts from one profile.
    ProfilePosts { profile_url: String, limit: u32 },
    /// Content matching a keyword, each item carrying its author.
    SearchContent { keyword: String, limit: u32 },
}

impl ScrapeQuery {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeQuery::DiscoverProfiles { .. } => "profile discovery",
            ScrapeQuery::ProfilePosts { .. } => "profile posts",
            ScrapeQuery::SearchContent { .. } => "content search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `run-sync-get-dataset-items`: one blocking call.
    Sync,
    /// Start a run, poll its status, then read the dataset.
    Async,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorCall {
    pub actor: &'static str,
    pub mode: RunMode,
    pub input: Value,
}

/// Map a query onto the actor and payload serving it on `platform`.
///
/// # Errors
///
/// Returns [`ScraperError::UnsupportedQuery`] for combinations the platform's
/// actor cannot serve.
pub fn actor_call(
    platform: Platform,
    query: &ScrapeQuery,
    settings: &ScraperSettings,
) -> Result<ActorCall, ScraperError> {
    match (platform, query) {
        (Platform::Instagram, ScrapeQuery::DiscoverProfiles { keyword, limit }) => Ok(ActorCall {
            actor: INSTAGRAM_ACTOR,
            mode: RunMode::Sync,
            input: json!({
                "search": keyword,
                "searchType": "user",
                "searchLimit": limit,
                "resultsType": "details",
            }),
        }),
        (Platform::Instagram, ScrapeQuery::ProfilePosts { profile_url, limit }) => Ok(ActorCall {
            actor: INSTAGRAM_ACTOR,
            mode: RunMode::Sync,
            input: json!({
                "directUrls": [profile_url],
                "resultsType": "posts",
                "resultsLimit": limit,
                "addParentData": true,
            }),
        }),
        (Platform::Tiktok, ScrapeQuery::SearchContent { keyword, limit }) => Ok(ActorCall {
            actor: TIKTOK_ACTOR,
            mode: RunMode::Async,
            input: json!({
                "searchQueries": [keyword],
                "searchSection": "/video",
                "resultsPerPage": (*limit).min(TIKTOK_MAX_RESULTS_PER_PAGE),
                "proxyCountry": settings.tiktok_proxy_country,
            }),
        }),
        (Platform::X, ScrapeQuery::SearchContent { keyword, limit }) => Ok(ActorCall {
            actor: X_ACTOR,
            mode: RunMode::Sync,
            input: json!({
                "searchTerms": [format!("{keyword} lang:{}", settings.x_language)],
                "maxItems": limit,
                "sort": settings.x_sort,
                "tweetLanguage": settings.x_language,
                "includeSearchTerms": true,
            }),
        }),
        (platform, query) => Err(ScraperError::UnsupportedQuery {
            platform,
            query: query.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_discovery_payload() {
        let call = actor_call(
            Platform::Instagram,
            &ScrapeQuery::DiscoverProfiles {
                keyword: "グルメ".into(),
                limit: 50,
            },
            &ScraperSettings::default(),
        )
        .unwrap();
        assert_eq!(call.actor, "apify~instagram-scraper");
        assert_eq!(call.mode, RunMode::Sync);
        assert_eq!(call.input["search"], "グルメ");
        assert_eq!(call.input["searchType"], "user");
        assert_eq!(call.input["resultsType"], "details");
        assert_eq!(call.input["searchLimit"], 50);
    }

    #[test]
    fn instagram_posts_payload() {
        let call = actor_call(
            Platform::Instagram,
            &ScrapeQuery::ProfilePosts {
                profile_url: "https://www.instagram.com/hanako/".into(),
                limit: 20,
            },
            &ScraperSettings::default(),
        )
        .unwrap();
        assert_eq!(call.input["directUrls"][0], "https://www.instagram.com/hanako/");
        assert_eq!(call.input["resultsType"], "posts");
        assert_eq!(call.input["addParentData"], true);
    }

    #[test]
    fn tiktok_search_is_async_and_capped() {
        let call = actor_call(
            Platform::Tiktok,
            &ScrapeQuery::SearchContent {
                keyword: "コスメ".into(),
                limit: 120,
            },
            &ScraperSettings::default(),
        )
        .unwrap();
        assert_eq!(call.mode, RunMode::Async);
        assert_eq!(call.input["resultsPerPage"], 100);
        assert_eq!(call.input["proxyCountry"], "JP");
        assert_eq!(call.input["searchSection"], "/video");
    }

    #[test]
    fn x_search_appends_language_filter() {
        let call = actor_call(
            Platform::X,
            &ScrapeQuery::SearchContent {
                keyword: "コスメ".into(),
                limit: 300,
            },
            &ScraperSettings::default(),
        )
        .unwrap();
        assert_eq!(call.input["searchTerms"][0], "コスメ lang:ja");
        assert_eq!(call.input["sort"], "Latest");
        assert_eq!(call.input["maxItems"], 300);
    }

    #[test]
    fn unsupported_combination_is_an_error() {
        let result = actor_call(
            Platform::X,
            &ScrapeQuery::DiscoverProfiles {
                keyword: "a".into(),
                limit: 1,
            },
            &ScraperSettings::default(),
        );
        assert!(matches!(
            result,
            Err(ScraperError::UnsupportedQuery {
                platform: Platform::X,
                ..
            })
        ));
    }
}
