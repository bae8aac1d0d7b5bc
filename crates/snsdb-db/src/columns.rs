//! Per-table write allow-lists.
//!
//! Remote schemas drift; writing a column the table lacks fails the whole
//! request. Each run reads the live column sets once and filters every row
//! before it is written.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::store::{Row, Store};

pub mod tables {
    pub const ACCOUNTS: &str = "sns_accounts";
    pub const ACCOUNT_METRICS: &str = "accounts_metrics";
    pub const POSTS: &str = "posts";
    pub const POST_METRICS: &str = "post_metrics";
    pub const HASHTAGS: &str = "hashtags";
    pub const POST_HASHTAGS: &str = "post_hashtag";

    pub const ALL: [&str; 6] = [
        ACCOUNTS,
        ACCOUNT_METRICS,
        POSTS,
        POST_METRICS,
        HASHTAGS,
        POST_HASHTAGS,
    ];
}

/// Columns of the schema shipped in `migrations/`.
fn known_columns(table: &str) -> &'static [&'static str] {
    match table {
        tables::ACCOUNTS => &[
            "id",
            "platform",
            "platform_user_id",
            "platform_profile_id",
            "account_name",
            "display_name",
            "account_url",
            "caption",
            "profile_image_url",
            "is_verified",
            "business_account",
            "country",
            "language",
            "keyword",
            "keywords",
            "last_profile_scraped_at",
            "last_posts_scraped_at",
            "created_at",
            "updated_at",
        ],
        tables::ACCOUNT_METRICS => &[
            "id",
            "account_id",
            "metric_date",
            "followers",
            "following",
            "posts",
            "created_at",
        ],
        tables::POSTS => &[
            "id",
            "account_id",
            "external_post_id",
            "content_text",
            "caption",
            "link",
            "media_type",
            "posted_at",
            "scraped_at",
            "created_at",
        ],
        tables::POST_METRICS => &[
            "id",
            "post_id",
            "metric_date",
            "likes",
            "comments",
            "views",
            "shares",
            "retweets",
            "quotes",
            "created_at",
        ],
        tables::HASHTAGS => &["id", "tag", "created_at"],
        tables::POST_HASHTAGS => &["id", "post_id", "hashtag_id", "created_at"],
        _ => &[],
    }
}

pub struct TableColumns {
    tables: HashMap<String, BTreeSet<String>>,
    warned: Mutex<HashSet<(String, String)>>,
}

impl TableColumns {
    /// Allow-lists from the shipped schema only.
    #[must_use]
    pub fn known() -> Self {
        let tables = tables::ALL
            .iter()
            .map(|table| {
                let cols = known_columns(table).iter().map(|c| (*c).to_string());
                ((*table).to_string(), cols.collect())
            })
            .collect();
        Self {
            tables,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Ask `store` for each table's columns, keeping the shipped schema where
    /// it cannot answer.
    pub async fn discover<S: Store>(store: &S) -> Self {
        let mut columns = Self::known();
        for table in tables::ALL {
            match store.columns(table).await {
                Ok(Some(live)) => {
                    tracing::debug!(table, columns = live.len(), "using live column set");
                    columns.tables.insert(table.to_string(), live);
                }
                Ok(None) => {
                    tracing::debug!(table, "column set unavailable; using known schema");
                }
                Err(e) => {
                    tracing::warn!(table, error = %e, "column discovery failed; using known schema");
                }
            }
        }
        columns
    }

    #[must_use]
    pub fn has(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|cols| cols.contains(column))
    }

    /// Drop the fields of `row` that `table` does not have. Each dropped
    /// (table, column) pair is logged once.
    #[must_use]
    pub fn filter(&self, table: &str, row: Row) -> Row {
        let Some(allowed) = self.tables.get(table) else {
            return row;
        };
        let mut kept = Row::new();
        for (column, value) in row {
            if allowed.contains(&column) {
                kept.insert(column, value);
            } else {
                self.warn_dropped(table, &column);
            }
        }
        kept
    }

    fn warn_dropped(&self, table: &str, column: &str) {
        let mut warned = self.warned.lock().unwrap_or_else(PoisonError::into_inner);
        if warned.insert((table.to_string(), column.to_string())) {
            tracing::warn!(table, column, "column not present in store schema; dropping field");
        }
    }
}
