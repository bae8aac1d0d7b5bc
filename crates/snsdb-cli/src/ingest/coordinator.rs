//! Per-platform run orchestration.
//!
//! Keywords run one at a time. A keyword's failure is logged and counted;
//! the run moves on to the next keyword.

use std::fmt;
use std::time::Duration;

use snsdb_core::{AppConfig, Clock, KeywordPool, Platform};
use snsdb_db::{ImageStore, Store, TableColumns};
use snsdb_scraper::Scraper;
use snsdb_signals::{CycleStateRepo, KeywordRotation, RotationError};
use tracing::Instrument;

use super::{discovery, search};

/// Everything a run touches, borrowed for its duration.
pub(crate) struct Coordinator<'a, St, Sc, Im, Cl> {
    pub store: &'a St,
    pub scraper: &'a Sc,
    pub images: &'a Im,
    pub clock: &'a Cl,
    pub columns: &'a TableColumns,
    pub config: &'a AppConfig,
}

/// Counters for one keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct KeywordStats {
    /// Accounts written (created or refreshed).
    pub accounts: usize,
    /// Profiles the classifier or follower floor turned away.
    pub skipped: usize,
    /// Accounts whose individual writes failed.
    pub failed_accounts: usize,
    pub trending: usize,
    pub posts: usize,
}

impl std::ops::AddAssign for KeywordStats {
    fn add_assign(&mut self, rhs: Self) {
        self.accounts += rhs.accounts;
        self.skipped += rhs.skipped;
        self.failed_accounts += rhs.failed_accounts;
        self.trending += rhs.trending;
        self.posts += rhs.posts;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlatformReport {
    pub platform: Platform,
    pub keywords: usize,
    pub failed_keywords: usize,
    pub totals: KeywordStats,
}

impl fmt::Display for PlatformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} keywords ({} failed), {} accounts written, {} skipped, {} trending, {} posts",
            self.platform,
            self.keywords,
            self.failed_keywords,
            self.totals.accounts,
            self.totals.skipped,
            self.totals.trending,
            self.totals.posts,
        )
    }
}

impl<St, Sc, Im, Cl> Coordinator<'_, St, Sc, Im, Cl>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    /// Pick this run's keywords from `pool` and process each of them.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::EmptyPool`] before any work when the pool has
    /// no keywords. Keyword-level failures are reported, not returned.
    pub async fn run<R: CycleStateRepo + Sync>(
        &self,
        platform: Platform,
        pool: &KeywordPool,
        rotation: &KeywordRotation<R>,
    ) -> Result<PlatformReport, RotationError> {
        let count = pool.per_run(self.config.keywords_per_run);
        let keywords = rotation.pick(&pool.keywords, count)?;

        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("ingest", %run_id, %platform);
        Ok(self.run_keywords(platform, &keywords).instrument(span).await)
    }

    async fn run_keywords(&self, platform: Platform, keywords: &[String]) -> PlatformReport {
        tracing::info!(keywords = ?keywords, "starting ingest run");
        let mut report = PlatformReport {
            platform,
            keywords: keywords.len(),
            failed_keywords: 0,
            totals: KeywordStats::default(),
        };

        for keyword in keywords {
            match self.run_keyword(platform, keyword).await {
                Ok(stats) => {
                    tracing::info!(
                        keyword,
                        accounts = stats.accounts,
                        skipped = stats.skipped,
                        trending = stats.trending,
                        posts = stats.posts,
                        "keyword complete"
                    );
                    report.totals += stats;
                }
                Err(e) => {
                    tracing::error!(keyword, error = %format!("{e:#}"), "keyword failed");
                    report.failed_keywords += 1;
                }
            }
        }

        tracing::info!(
            failed_keywords = report.failed_keywords,
            accounts = report.totals.accounts,
            "ingest run complete"
        );
        report
    }

    async fn run_keyword(&self, platform: Platform, keyword: &str) -> anyhow::Result<KeywordStats> {
        match platform {
            Platform::Instagram => discovery::run(self, keyword).await,
            Platform::Tiktok => search::run(self, platform, keyword, search::PostsFor::Trending).await,
            Platform::X => {
                search::run(self, platform, keyword, search::PostsFor::AllQualifying).await
            }
        }
    }
}

/// Fixed delay between write bursts.
pub(super) async fn pace(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
