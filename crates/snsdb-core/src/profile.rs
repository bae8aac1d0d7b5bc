//! Platform-agnostic records produced by normalization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Platform;

/// A scraped account after field resolution. Never persisted as-is; it feeds
/// classification and the `sns_accounts` row builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProfile {
    pub platform: Platform,
    /// Stable provider id; falls back to the handle when the provider omits it.
    pub platform_user_id: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub biography: Option<String>,
    pub avatar_url: Option<String>,
    pub external_url: Option<String>,
    pub is_verified: bool,
    pub is_business: bool,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub posts: Option<i64>,
    pub profile_url: String,
}

impl NormalizedProfile {
    /// Follower count with missing values treated as zero.
    #[must_use]
    pub fn follower_count(&self) -> i64 {
        self.followers.unwrap_or(0)
    }
}

/// Engagement counters as reported at scrape time. Platforms only fill the
/// subset they expose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounters {
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub views: Option<i64>,
    pub shares: Option<i64>,
    pub retweets: Option<i64>,
    pub quotes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub external_id: String,
    pub caption: Option<String>,
    pub permalink: Option<String>,
    pub media_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub counters: PostCounters,
}

/// One day of an account's follower history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerPoint {
    pub date: NaiveDate,
    pub followers: i64,
}
