//! HTTP client for the Apify actor API.

mod run;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use snsdb_core::{Platform, ScraperSettings};

use crate::actors::{actor_call, RunMode, ScrapeQuery};
use crate::error::ScraperError;

const USER_AGENT: &str = "snsdb/0.1 (creator-ingest)";

/// Longest response body excerpt carried in an error.
const ERROR_BODY_MAX_CHARS: usize = 800;

/// Source of raw provider records for a platform query.
pub trait Scraper: Send + Sync {
    /// Run `query` on `platform` and return the raw dataset items.
    fn run(
        &self,
        platform: Platform,
        query: &ScrapeQuery,
    ) -> impl Future<Output = Result<Vec<Value>, ScraperError>> + Send;
}

/// Apify actor client.
///
/// Synchronous actors use `run-sync-get-dataset-items`; asynchronous ones
/// are started, polled until terminal, then read from their default dataset.
/// Failures are not retried: the next scheduled run is the retry.
pub struct ApifyClient {
    client: Client,
    token: String,
    settings: ScraperSettings,
}

impl ApifyClient {
    /// Creates an `ApifyClient` against `settings.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(token: &str, settings: ScraperSettings) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            token: token.to_string(),
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Run an actor synchronously and return its dataset items.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx response.
    /// - [`ScraperError::Deserialize`] / [`ScraperError::Malformed`] when the
    ///   body is not a JSON array.
    /// - [`ScraperError::Http`] on network failure or timeout.
    pub async fn run_sync(&self, actor: &str, input: &Value) -> Result<Vec<Value>, ScraperError> {
        let url = self.url(&format!("acts/{actor}/run-sync-get-dataset-items"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;
        let response = ensure_success(response, &url).await?;
        let body = read_json(response, &url).await?;
        into_items(body, &url)
    }
}

impl Scraper for ApifyClient {
    async fn run(
        &self,
        platform: Platform,
        query: &ScrapeQuery,
    ) -> Result<Vec<Value>, ScraperError> {
        let call = actor_call(platform, query, &self.settings)?;
        tracing::debug!(
            %platform,
            actor = call.actor,
            query = query.kind(),
            "starting actor run"
        );
        let items = match call.mode {
            RunMode::Sync => self.run_sync(call.actor, &call.input).await?,
            RunMode::Async => self.run_async(call.actor, &call.input).await?,
        };
        tracing::debug!(%platform, items = items.len(), "actor run returned items");
        Ok(items)
    }
}

async fn ensure_success(response: Response, url: &str) -> Result<Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ScraperError::UnexpectedStatus {
        status: status.as_u16(),
        url: redact_url(url),
        body: truncate_chars(&body, ERROR_BODY_MAX_CHARS),
    })
}

async fn read_json(response: Response, url: &str) -> Result<Value, ScraperError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| ScraperError::Deserialize {
        context: redact_url(url),
        source,
    })
}

fn into_items(body: Value, url: &str) -> Result<Vec<Value>, ScraperError> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(ScraperError::Malformed {
            context: redact_url(url),
            reason: format!("expected a JSON array, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strip the query string; it may carry credentials.
fn redact_url(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

pub(crate) fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    s.chars().skip(count - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("グルメ最高", 3), "グルメ…");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn tail_keeps_last_chars() {
        assert_eq!(tail_chars("line1\nline2", 5), "line2");
        assert_eq!(tail_chars("ok", 5), "ok");
    }

    #[test]
    fn redact_url_drops_query() {
        assert_eq!(
            redact_url("https://api.apify.com/v2/acts/x?token=secret"),
            "https://api.apify.com/v2/acts/x"
        );
    }

    #[test]
    fn non_array_body_is_malformed() {
        let err = into_items(serde_json::json!({"error": "nope"}), "u").unwrap_err();
        assert!(matches!(err, ScraperError::Malformed { ref reason, .. } if reason.contains("object")));
    }
}
