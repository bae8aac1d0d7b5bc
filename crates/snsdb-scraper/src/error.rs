use snsdb_core::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("malformed response from {context}: {reason}")]
    Malformed { context: String, reason: String },

    #[error("actor run {run_id} finished with status {status}; log tail: {log_tail}")]
    RunFailed {
        run_id: String,
        status: String,
        log_tail: String,
    },

    #[error("actor run {run_id} still running after {polls} status checks")]
    RunTimedOut { run_id: String, polls: u32 },

    #[error("{platform} does not support {query} queries")]
    UnsupportedQuery {
        platform: Platform,
        query: &'static str,
    },
}
