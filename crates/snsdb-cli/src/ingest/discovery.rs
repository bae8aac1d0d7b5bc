//! Discover-then-track: grow a keyword's candidate pool with a profile
//! search when it is thin or stale, then scrape posts for the trending
//! candidates that are due.

use snsdb_core::{Clock, Platform};
use snsdb_db::{list_keyword_candidates, AccountRow, ImageStore, Store};
use snsdb_scraper::{normalize_posts, normalize_profiles, ScrapeQuery, Scraper};
use snsdb_signals::{classify, needs_discovery, needs_posts_refresh, Verdict};

use super::coordinator::{pace, Coordinator, KeywordStats};

const PLATFORM: Platform = Platform::Instagram;

pub(super) async fn run<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    keyword: &str,
) -> anyhow::Result<KeywordStats>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    let discovery = &co.config.discovery;
    let mut stats = KeywordStats::default();

    let mut candidates = load_candidates(co, keyword).await?;
    let last_seen: Vec<_> = candidates
        .iter()
        .map(|a| a.last_profile_scraped_at)
        .collect();
    if needs_discovery(
        &last_seen,
        discovery.stale_days,
        discovery.min_candidates_per_keyword,
        co.clock.now(),
    ) {
        tracing::info!(keyword, cached = candidates.len(), "running profile discovery");
        stats += discover(co, keyword).await?;
        candidates = load_candidates(co, keyword).await?;
    } else {
        tracing::info!(keyword, cached = candidates.len(), "candidate pool fresh; skipping discovery");
    }

    for account in &candidates {
        match track(co, account).await {
            Ok(tracked) => stats += tracked,
            Err(e) => {
                tracing::warn!(account = %account.account_name, error = %format!("{e:#}"), "tracking failed");
                stats.failed_accounts += 1;
            }
        }
    }
    Ok(stats)
}

async fn load_candidates<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    keyword: &str,
) -> anyhow::Result<Vec<AccountRow>>
where
    St: Store,
{
    Ok(list_keyword_candidates(
        co.store,
        PLATFORM,
        keyword,
        co.config.discovery.max_candidates_fetch,
    )
    .await?)
}

/// Search profiles for `keyword` and persist the qualifying ones.
async fn discover<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    keyword: &str,
) -> anyhow::Result<KeywordStats>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    let query = ScrapeQuery::DiscoverProfiles {
        keyword: keyword.to_string(),
        limit: co.config.scraper.search_limit,
    };
    let records = co.scraper.run(PLATFORM, &query).await?;
    let profiles = normalize_profiles(PLATFORM, &records);
    tracing::debug!(keyword, records = records.len(), profiles = profiles.len(), "discovery results");

    let mut stats = KeywordStats::default();
    for profile in &profiles {
        if let Verdict::Rejected(reason) = classify(profile, &co.config.classifier) {
            tracing::debug!(account = %profile.handle, %reason, "skipping profile");
            stats.skipped += 1;
            continue;
        }
        match co.persist_account(profile, Some(keyword)).await {
            Ok(_) => stats.accounts += 1,
            Err(e) => {
                tracing::warn!(account = %profile.handle, error = %format!("{e:#}"), "account write failed");
                stats.failed_accounts += 1;
            }
        }
        pace(co.config.pacing.account_write_delay_ms).await;
    }
    Ok(stats)
}

/// Trend-check one candidate and scrape its posts when trending and due.
async fn track<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    account: &AccountRow,
) -> anyhow::Result<KeywordStats>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    let mut stats = KeywordStats::default();
    let verdict = co.trend_for(account.id).await?;
    if !verdict.is_trending() {
        tracing::debug!(account = %account.account_name, %verdict, "not trending");
        return Ok(stats);
    }
    stats.trending += 1;

    if !needs_posts_refresh(
        account.last_posts_scraped_at,
        co.config.discovery.posts_refresh_hours,
        co.clock.now(),
    ) {
        tracing::debug!(account = %account.account_name, "posts fresh; skipping");
        return Ok(stats);
    }

    let profile_url = account
        .account_url
        .clone()
        .unwrap_or_else(|| PLATFORM.profile_url(&account.account_name));
    let query = ScrapeQuery::ProfilePosts {
        profile_url,
        limit: co.config.scraper.posts_limit,
    };
    let records = co.scraper.run(PLATFORM, &query).await?;
    let posts = normalize_posts(PLATFORM, &records);
    let outcome = co.persist_posts(account, &posts).await?;
    stats.posts += outcome.posts;
    tracing::info!(account = %account.account_name, %verdict, posts = outcome.posts, "trending account refreshed");
    pace(co.config.pacing.posts_delay_ms).await;
    Ok(stats)
}
