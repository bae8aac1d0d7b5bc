//! Search-then-filter: one content search per keyword, grouped by author.
//! Every qualifying author gets an account row and a snapshot; posts are
//! written for trending authors (TikTok) or every qualifying author (X).

use snsdb_core::{Clock, Platform};
use snsdb_db::{ImageStore, Store};
use snsdb_scraper::{group_by_author, AuthorActivity, ScrapeQuery, Scraper};
use snsdb_signals::{classify, Verdict};

use super::coordinator::{pace, Coordinator, KeywordStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PostsFor {
    Trending,
    AllQualifying,
}

pub(super) async fn run<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    platform: Platform,
    keyword: &str,
    posts_for: PostsFor,
) -> anyhow::Result<KeywordStats>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    let settings = &co.config.scraper;
    let limit = match platform {
        Platform::X => settings.x_max_items,
        Platform::Tiktok | Platform::Instagram => settings.tiktok_max_items,
    };
    let query = ScrapeQuery::SearchContent {
        keyword: keyword.to_string(),
        limit,
    };
    let records = co.scraper.run(platform, &query).await?;
    let authors = group_by_author(platform, &records, settings.max_posts_per_author);
    tracing::info!(keyword, records = records.len(), authors = authors.len(), "search results");

    let mut stats = KeywordStats::default();
    for author in &authors {
        if let Verdict::Rejected(reason) = classify(&author.profile, &co.config.classifier) {
            tracing::debug!(account = %author.profile.handle, %reason, "skipping author");
            stats.skipped += 1;
            continue;
        }
        match ingest_author(co, keyword, author, posts_for).await {
            Ok(author_stats) => stats += author_stats,
            Err(e) => {
                tracing::warn!(
                    account = %author.profile.handle,
                    error = %format!("{e:#}"),
                    "author ingest failed"
                );
                stats.failed_accounts += 1;
            }
        }
        pace(co.config.pacing.account_write_delay_ms).await;
    }
    Ok(stats)
}

async fn ingest_author<St, Sc, Im, Cl>(
    co: &Coordinator<'_, St, Sc, Im, Cl>,
    keyword: &str,
    author: &AuthorActivity,
    posts_for: PostsFor,
) -> anyhow::Result<KeywordStats>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    let mut stats = KeywordStats::default();
    let account = co.persist_account(&author.profile, Some(keyword)).await?;
    stats.accounts += 1;

    let write_posts = match posts_for {
        PostsFor::AllQualifying => true,
        PostsFor::Trending => {
            let verdict = co.trend_for(account.id).await?;
            tracing::debug!(account = %account.account_name, %verdict, "trend verdict");
            verdict.is_trending()
        }
    };
    if posts_for == PostsFor::Trending && write_posts {
        stats.trending += 1;
    }
    if write_posts && !author.posts.is_empty() {
        let outcome = co.persist_posts(&account, &author.posts).await?;
        stats.posts += outcome.posts;
    }
    Ok(stats)
}
