//! Merge rules for `sns_accounts` and `accounts_metrics`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};
use snsdb_core::{FollowerPoint, LocaleTags, NormalizedProfile, Platform};

use crate::columns::{tables, TableColumns};
use crate::store::{int_field, into_row, Query, Row, Store};
use crate::DbError;

/// A stored account as read back from `sns_accounts`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub id: i64,
    pub platform: String,
    pub platform_user_id: Option<String>,
    pub account_name: String,
    pub account_url: Option<String>,
    pub profile_image_url: Option<String>,
    pub keywords: Option<String>,
    pub last_profile_scraped_at: Option<DateTime<Utc>>,
    pub last_posts_scraped_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    /// # Errors
    ///
    /// Returns [`DbError::Malformed`] when the row has no integer `id` or no
    /// `account_name`.
    pub fn from_row(row: &Row) -> Result<Self, DbError> {
        let malformed = |reason: &str| DbError::Malformed {
            context: tables::ACCOUNTS.to_string(),
            reason: reason.to_string(),
        };
        Ok(Self {
            id: int_field(row, "id").ok_or_else(|| malformed("row without an integer id"))?,
            platform: text(row, "platform").unwrap_or_default(),
            platform_user_id: text(row, "platform_user_id"),
            account_name: text(row, "account_name")
                .ok_or_else(|| malformed("row without account_name"))?,
            account_url: text(row, "account_url"),
            profile_image_url: text(row, "profile_image_url"),
            keywords: text(row, "keywords"),
            last_profile_scraped_at: timestamp(row, "last_profile_scraped_at"),
            last_posts_scraped_at: timestamp(row, "last_posts_scraped_at"),
        })
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339 and zone-less timestamps (read as UTC).
fn timestamp(row: &Row, column: &str) -> Option<DateTime<Utc>> {
    let raw = text(row, column)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn rows_to_accounts(rows: &[Row]) -> Result<Vec<AccountRow>, DbError> {
    rows.iter().map(AccountRow::from_row).collect()
}

/// Look an account up by stable id, falling back to its handle.
///
/// # Errors
///
/// Propagates store failures.
pub async fn find_account<S: Store>(
    store: &S,
    platform: Platform,
    platform_user_id: &str,
    handle: &str,
) -> Result<Option<AccountRow>, DbError> {
    let by_id = Query::new()
        .eq("platform", platform)
        .eq("platform_user_id", platform_user_id)
        .limit(1);
    if let Some(row) = store.get(tables::ACCOUNTS, &by_id).await?.first() {
        return AccountRow::from_row(row).map(Some);
    }
    let by_handle = Query::new()
        .eq("platform", platform)
        .eq("account_name", handle)
        .limit(1);
    match store.get(tables::ACCOUNTS, &by_handle).await?.first() {
        Some(row) => AccountRow::from_row(row).map(Some),
        None => Ok(None),
    }
}

/// Accounts tagged with `keyword`, newest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_keyword_candidates<S: Store>(
    store: &S,
    platform: Platform,
    keyword: &str,
    limit: usize,
) -> Result<Vec<AccountRow>, DbError> {
    let query = Query::new()
        .eq("platform", platform)
        .contains("keywords", keyword)
        .order_desc("id")
        .limit(limit);
    rows_to_accounts(&store.get(tables::ACCOUNTS, &query).await?)
}

/// Append `keyword` to a `", "`-joined tag list unless already present,
/// case-insensitively. The first spelling of a tag wins.
#[must_use]
pub fn merge_keywords(existing: Option<&str>, keyword: Option<&str>) -> Option<String> {
    let mut merged: Vec<&str> = Vec::new();
    let candidates = existing
        .unwrap_or_default()
        .split(',')
        .chain(keyword)
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    for tag in candidates {
        if !merged.iter().any(|m| m.to_lowercase() == tag.to_lowercase()) {
            merged.push(tag);
        }
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged.join(", "))
    }
}

/// Everything needed to write one account row.
pub struct AccountWrite<'a> {
    pub profile: &'a NormalizedProfile,
    /// Stored row for this profile, from [`find_account`].
    pub existing: Option<&'a AccountRow>,
    /// Keyword that surfaced the profile in this run.
    pub keyword: Option<&'a str>,
    /// Durable avatar URL or the platform fallback.
    pub avatar_url: &'a str,
    pub locale: &'a LocaleTags,
    pub min_followers: i64,
    pub now: DateTime<Utc>,
}

fn account_row(write: &AccountWrite<'_>, keywords: Option<String>) -> Row {
    let p = write.profile;
    let now = write.now.to_rfc3339();
    let mut row = into_row(json!({
        "platform": p.platform.as_str(),
        "platform_user_id": p.platform_user_id,
        "platform_profile_id": p.handle,
        "account_name": p.handle,
        "display_name": p.display_name,
        "account_url": p.profile_url,
        "caption": p.biography,
        "profile_image_url": write.avatar_url,
        "is_verified": p.is_verified,
        "business_account": p.is_business,
        "country": write.locale.country,
        "language": write.locale.language,
        "last_profile_scraped_at": now,
        "updated_at": now,
    }));
    if let Some(keyword) = write.keyword {
        row.insert("keyword".to_string(), Value::from(keyword));
    }
    if let Some(keywords) = keywords {
        row.insert("keywords".to_string(), Value::from(keywords));
    }
    row
}

/// Insert or update the account for `write.profile` and return the stored
/// row.
///
/// `write.existing` must be the current lookup result; keyword tags merge
/// into it. An existing row found only by handle has its `platform_user_id` patched
/// first, so the keyed upsert lands on it instead of colliding with the
/// handle constraint.
///
/// # Errors
///
/// - [`DbError::BelowFollowerFloor`] when the profile has too few followers.
/// - [`DbError::Malformed`] when the store returns no usable row.
/// - Any store failure.
pub async fn upsert_account<S: Store>(
    store: &S,
    columns: &TableColumns,
    write: &AccountWrite<'_>,
) -> Result<AccountRow, DbError> {
    let profile = write.profile;
    if profile.follower_count() < write.min_followers {
        return Err(DbError::BelowFollowerFloor {
            handle: profile.handle.clone(),
            followers: profile.follower_count(),
            min: write.min_followers,
        });
    }

    if let Some(found) = write.existing {
        if found.platform_user_id.as_deref() != Some(profile.platform_user_id.as_str())
            && columns.has(tables::ACCOUNTS, "platform_user_id")
        {
            tracing::debug!(
                account = %profile.handle,
                from = ?found.platform_user_id,
                to = %profile.platform_user_id,
                "reconciling platform_user_id"
            );
            let mut fields = Row::new();
            fields.insert(
                "platform_user_id".to_string(),
                Value::from(profile.platform_user_id.clone()),
            );
            store
                .patch(tables::ACCOUNTS, &Query::new().eq("id", found.id), &fields)
                .await?;
        }
    }

    let keywords = merge_keywords(
        write.existing.and_then(|a| a.keywords.as_deref()),
        write.keyword,
    );
    let row = columns.filter(tables::ACCOUNTS, account_row(write, keywords));
    let conflict: &[&str] = if columns.has(tables::ACCOUNTS, "platform_user_id") {
        &["platform", "platform_user_id"]
    } else {
        &["platform", "account_name"]
    };
    let written = store.upsert(tables::ACCOUNTS, &[row], Some(conflict)).await?;
    match written.first() {
        Some(row) => AccountRow::from_row(row),
        None => Err(DbError::Malformed {
            context: tables::ACCOUNTS.to_string(),
            reason: "upsert returned no rows".to_string(),
        }),
    }
}

/// Record today's follower, following and post counts. A second write on
/// the same date replaces the first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn upsert_account_metric<S: Store>(
    store: &S,
    columns: &TableColumns,
    account_id: i64,
    date: NaiveDate,
    profile: &NormalizedProfile,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let row = into_row(json!({
        "account_id": account_id,
        "metric_date": date.to_string(),
        "followers": profile.followers.unwrap_or(0),
        "following": profile.following.unwrap_or(0),
        "posts": profile.posts.unwrap_or(0),
        "created_at": now.to_rfc3339(),
    }));
    let row = columns.filter(tables::ACCOUNT_METRICS, row);
    store
        .upsert(
            tables::ACCOUNT_METRICS,
            &[row],
            Some(&["account_id", "metric_date"]),
        )
        .await?;
    Ok(())
}

/// Up to `points` most recent daily follower counts, newest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn recent_follower_series<S: Store>(
    store: &S,
    account_id: i64,
    points: usize,
) -> Result<Vec<FollowerPoint>, DbError> {
    let query = Query::new()
        .select(&["metric_date", "followers"])
        .eq("account_id", account_id)
        .order_desc("metric_date")
        .limit(points);
    let rows = store.get(tables::ACCOUNT_METRICS, &query).await?;
    let mut series = Vec::with_capacity(rows.len());
    for row in &rows {
        let date = text(row, "metric_date")
            .and_then(|raw| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok());
        match (date, int_field(row, "followers")) {
            (Some(date), Some(followers)) => series.push(FollowerPoint { date, followers }),
            _ => tracing::warn!(
                account_id,
                row = ?row,
                "skipping unparseable follower snapshot"
            ),
        }
    }
    Ok(series)
}

/// Stamp `last_posts_scraped_at` after a successful posts pass.
///
/// # Errors
///
/// Propagates store failures.
pub async fn mark_posts_scraped<S: Store>(
    store: &S,
    columns: &TableColumns,
    account_id: i64,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let mut fields = Row::new();
    fields.insert(
        "last_posts_scraped_at".to_string(),
        Value::from(now.to_rfc3339()),
    );
    let fields = columns.filter(tables::ACCOUNTS, fields);
    if fields.is_empty() {
        return Ok(());
    }
    store
        .patch(tables::ACCOUNTS, &Query::new().eq("id", account_id), &fields)
        .await
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
