//! Account, snapshot and posts writes shared by every pipeline variant.

use snsdb_core::{Clock, NormalizedPost, NormalizedProfile};
use snsdb_db::{
    find_account, mark_posts_scraped, recent_follower_series, upsert_account,
    upsert_account_metric, upsert_post_batch, AccountRow, AccountWrite, ImageStore,
    PostBatchOutcome, Store, TaggedPost,
};
use snsdb_scraper::Scraper;
use snsdb_signals::{evaluate_trend, extract_hashtags, TrendVerdict};

use super::Coordinator;

/// The avatar URL to persist.
///
/// An already durable stored URL is reused. Default placeholders never reach
/// the image store. Otherwise the provider image is copied, and the fallback
/// is used when that fails.
pub(super) async fn resolve_avatar<Im: ImageStore>(
    images: &Im,
    profile: &NormalizedProfile,
    existing: Option<&AccountRow>,
    fallback: &str,
) -> String {
    if let Some(stored) = existing.and_then(|a| a.profile_image_url.as_deref()) {
        if images.is_durable(stored) {
            return stored.to_string();
        }
    }
    let source = match profile.avatar_url.as_deref() {
        Some(url) if !profile.platform.is_default_avatar(url) => url,
        _ => return fallback.to_string(),
    };
    if images.is_durable(source) {
        return source.to_string();
    }
    match images
        .put(profile.platform, source, &profile.platform_user_id)
        .await
    {
        Some(url) => url,
        None => {
            tracing::warn!(account = %profile.handle, "using fallback avatar");
            fallback.to_string()
        }
    }
}

impl<St, Sc, Im, Cl> Coordinator<'_, St, Sc, Im, Cl>
where
    St: Store,
    Sc: Scraper,
    Im: ImageStore,
    Cl: Clock,
{
    /// Upsert the account for `profile` and today's metric snapshot.
    pub(super) async fn persist_account(
        &self,
        profile: &NormalizedProfile,
        keyword: Option<&str>,
    ) -> anyhow::Result<AccountRow> {
        let existing = find_account(
            self.store,
            profile.platform,
            &profile.platform_user_id,
            &profile.handle,
        )
        .await?;
        let fallback = self.config.default_avatars.for_platform(profile.platform);
        let avatar = resolve_avatar(self.images, profile, existing.as_ref(), fallback).await;

        let now = self.clock.now();
        let account = upsert_account(
            self.store,
            self.columns,
            &AccountWrite {
                profile,
                existing: existing.as_ref(),
                keyword,
                avatar_url: &avatar,
                locale: &self.config.locale,
                min_followers: self.config.classifier.min_followers,
                now,
            },
        )
        .await?;
        upsert_account_metric(
            self.store,
            self.columns,
            account.id,
            self.clock.today(),
            profile,
            now,
        )
        .await?;
        tracing::debug!(account = %account.account_name, id = account.id, "account persisted");
        Ok(account)
    }

    /// Trend verdict over the account's stored follower history.
    pub(super) async fn trend_for(&self, account_id: i64) -> anyhow::Result<TrendVerdict> {
        let settings = &self.config.trend;
        let series =
            recent_follower_series(self.store, account_id, settings.window_days + 1).await?;
        Ok(evaluate_trend(&series, settings))
    }

    /// Write `posts` with their counters and hashtags, then stamp the
    /// account's posts-scraped time.
    pub(super) async fn persist_posts(
        &self,
        account: &AccountRow,
        posts: &[NormalizedPost],
    ) -> anyhow::Result<PostBatchOutcome> {
        let tagged: Vec<TaggedPost<'_>> = posts
            .iter()
            .map(|post| TaggedPost {
                post,
                hashtags: post
                    .caption
                    .as_deref()
                    .map(extract_hashtags)
                    .unwrap_or_default(),
            })
            .collect();
        let now = self.clock.now();
        let outcome = upsert_post_batch(
            self.store,
            self.columns,
            account.id,
            &tagged,
            self.clock.today(),
            now,
        )
        .await?;
        mark_posts_scraped(self.store, self.columns, account.id, now).await?;
        tracing::debug!(
            account = %account.account_name,
            posts = outcome.posts,
            hashtags = outcome.hashtags,
            "posts persisted"
        );
        Ok(outcome)
    }
}
