//! Asynchronous actor runs: start, poll, read dataset.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{ensure_success, into_items, read_json, tail_chars, ApifyClient};
use crate::error::ScraperError;

const LOG_TAIL_MAX_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: RunInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunInfo {
    id: String,
    status: String,
    #[serde(default)]
    default_dataset_id: Option<String>,
}

enum RunState {
    Running,
    Succeeded,
    Failed,
}

fn run_state(status: &str) -> RunState {
    match status {
        "SUCCEEDED" => RunState::Succeeded,
        "FAILED" | "ABORTED" | "TIMED-OUT" => RunState::Failed,
        // READY, RUNNING, TIMING-OUT, ABORTING and anything new.
        _ => RunState::Running,
    }
}

impl ApifyClient {
    /// Start an actor run, wait for it to finish and return its dataset items.
    ///
    /// Polls every `poll_interval_secs` up to `max_polls` times.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RunFailed`] when the run ends unsuccessfully (the
    ///   tail of its log is attached).
    /// - [`ScraperError::RunTimedOut`] when polling is exhausted.
    /// - Any error [`ApifyClient::run_sync`] can return, for each request.
    pub async fn run_async(
        &self,
        actor: &str,
        input: &Value,
    ) -> Result<Vec<Value>, ScraperError> {
        let mut run = self.start_run(actor, input).await?;
        let mut polls = 0u32;

        loop {
            match run_state(&run.status) {
                RunState::Succeeded => break,
                RunState::Failed => {
                    let log_tail = self.log_tail(&run.id).await;
                    return Err(ScraperError::RunFailed {
                        run_id: run.id,
                        status: run.status,
                        log_tail,
                    });
                }
                RunState::Running => {}
            }

            if polls >= self.settings.max_polls {
                return Err(ScraperError::RunTimedOut {
                    run_id: run.id,
                    polls,
                });
            }
            polls += 1;
            tokio::time::sleep(Duration::from_secs(self.settings.poll_interval_secs)).await;
            run = self.get_run(&run.id).await?;
            tracing::debug!(run_id = %run.id, status = %run.status, polls, "polled actor run");
        }

        let dataset_id = run
            .default_dataset_id
            .ok_or_else(|| ScraperError::Malformed {
                context: format!("actor run {}", run.id),
                reason: "succeeded without a defaultDatasetId".to_string(),
            })?;
        self.dataset_items(&dataset_id).await
    }

    async fn start_run(&self, actor: &str, input: &Value) -> Result<RunInfo, ScraperError> {
        let url = self.url(&format!("acts/{actor}/runs"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;
        let response = ensure_success(response, &url).await?;
        parse_run(read_json(response, &url).await?, &url)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunInfo, ScraperError> {
        let url = self.url(&format!("actor-runs/{run_id}"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = ensure_success(response, &url).await?;
        parse_run(read_json(response, &url).await?, &url)
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, ScraperError> {
        let url = self.url(&format!("datasets/{dataset_id}/items"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("clean", "true"), ("format", "json")])
            .send()
            .await?;
        let response = ensure_success(response, &url).await?;
        into_items(read_json(response, &url).await?, &url)
    }

    /// Best-effort: a missing log never masks the run failure itself.
    async fn log_tail(&self, run_id: &str) -> String {
        let url = self.url(&format!("logs/{run_id}"));
        let result = async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            let response = ensure_success(response, &url).await?;
            Ok::<_, ScraperError>(response.text().await?)
        }
        .await;

        match result {
            Ok(log) => tail_chars(&log, LOG_TAIL_MAX_CHARS),
            Err(e) => {
                tracing::warn!(run_id, error = %e, "failed to fetch actor run log");
                "<log unavailable>".to_string()
            }
        }
    }
}

fn parse_run(body: Value, url: &str) -> Result<RunInfo, ScraperError> {
    serde_json::from_value::<RunEnvelope>(body)
        .map(|envelope| envelope.data)
        .map_err(|source| ScraperError::Deserialize {
            context: super::redact_url(url),
            source,
        })
}
