//! Merge rules for `posts`, `post_metrics`, `hashtags` and `post_hashtag`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use snsdb_core::NormalizedPost;

use crate::columns::{tables, TableColumns};
use crate::store::{int_field, into_row, value_text, Row, Store};
use crate::DbError;

/// A post together with the hashtags found in its caption.
#[derive(Debug, Clone)]
pub struct TaggedPost<'a> {
    pub post: &'a NormalizedPost,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostBatchOutcome {
    pub posts: usize,
    pub metrics: usize,
    pub hashtags: usize,
    pub links: usize,
}

fn post_row(account_id: i64, post: &NormalizedPost, now: DateTime<Utc>) -> Row {
    into_row(json!({
        "account_id": account_id,
        "external_post_id": post.external_id,
        "caption": post.caption,
        "content_text": post.caption,
        "link": post.permalink,
        "media_type": post.media_type,
        "posted_at": post.posted_at.map(|ts| ts.to_rfc3339()),
        "scraped_at": now.to_rfc3339(),
    }))
}

fn metric_row(
    columns: &TableColumns,
    post_id: i64,
    post: &NormalizedPost,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Row {
    let c = post.counters;
    let mut row = into_row(json!({
        "post_id": post_id,
        "likes": c.likes,
        "comments": c.comments,
        "views": c.views,
        "shares": c.shares,
        "retweets": c.retweets,
        "quotes": c.quotes,
        "created_at": now.to_rfc3339(),
    }));
    if columns.has(tables::POST_METRICS, "metric_date") {
        row.insert("metric_date".to_string(), Value::from(today.to_string()));
    }
    columns.filter(tables::POST_METRICS, row)
}

/// `key -> id` for rows returned by an upsert.
fn ids_by(rows: &[Row], key: &str) -> HashMap<String, i64> {
    rows.iter()
        .filter_map(|row| Some((row.get(key).and_then(value_text)?, int_field(row, "id")?)))
        .collect()
}

/// Upsert `posts` for one account, snapshot their counters and link their
/// hashtags.
///
/// Posts are keyed on `external_post_id`. Counter snapshots are keyed on
/// `(post_id, metric_date)` when the schema has `metric_date` and appended
/// otherwise. Hashtags are keyed on `tag`, links on `(post_id, hashtag_id)`.
///
/// # Errors
///
/// Propagates store failures. Rows written before the failure stay written.
pub async fn upsert_post_batch<S: Store>(
    store: &S,
    columns: &TableColumns,
    account_id: i64,
    posts: &[TaggedPost<'_>],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<PostBatchOutcome, DbError> {
    // One statement may not touch the same key twice.
    let mut seen = HashSet::new();
    let posts: Vec<&TaggedPost<'_>> = posts
        .iter()
        .filter(|p| seen.insert(p.post.external_id.as_str()))
        .collect();
    if posts.is_empty() {
        return Ok(PostBatchOutcome::default());
    }

    let rows: Vec<Row> = posts
        .iter()
        .map(|p| columns.filter(tables::POSTS, post_row(account_id, p.post, now)))
        .collect();
    let written = store
        .upsert(tables::POSTS, &rows, Some(&["external_post_id"]))
        .await?;
    let post_ids = ids_by(&written, "external_post_id");

    let metric_rows: Vec<Row> = posts
        .iter()
        .filter_map(|p| {
            let post_id = *post_ids.get(&p.post.external_id)?;
            Some(metric_row(columns, post_id, p.post, today, now))
        })
        .collect();
    if !metric_rows.is_empty() {
        let conflict: Option<&[&str]> = if columns.has(tables::POST_METRICS, "metric_date") {
            Some(&["post_id", "metric_date"])
        } else {
            None
        };
        store
            .upsert(tables::POST_METRICS, &metric_rows, conflict)
            .await?;
    }

    let mut tags_by_post: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();
    for p in &posts {
        if let Some(post_id) = post_ids.get(&p.post.external_id) {
            tags_by_post
                .entry(*post_id)
                .or_default()
                .extend(p.hashtags.iter().map(String::as_str));
        }
    }
    let vocabulary: BTreeSet<&str> = tags_by_post.values().flatten().copied().collect();
    let mut outcome = PostBatchOutcome {
        posts: post_ids.len(),
        metrics: metric_rows.len(),
        ..PostBatchOutcome::default()
    };
    if vocabulary.is_empty() {
        return Ok(outcome);
    }

    let tag_rows: Vec<Row> = vocabulary
        .iter()
        .map(|tag| columns.filter(tables::HASHTAGS, into_row(json!({ "tag": tag }))))
        .collect();
    let written = store
        .upsert(tables::HASHTAGS, &tag_rows, Some(&["tag"]))
        .await?;
    let tag_ids = ids_by(&written, "tag");
    outcome.hashtags = tag_ids.len();

    let link_rows: Vec<Row> = tags_by_post
        .iter()
        .flat_map(|(post_id, tags)| {
            tags.iter()
                .filter_map(|tag| tag_ids.get(*tag))
                .map(move |hashtag_id| {
                    into_row(json!({ "post_id": post_id, "hashtag_id": hashtag_id }))
                })
        })
        .map(|row| columns.filter(tables::POST_HASHTAGS, row))
        .collect();
    if !link_rows.is_empty() {
        store
            .upsert(
                tables::POST_HASHTAGS,
                &link_rows,
                Some(&["post_id", "hashtag_id"]),
            )
            .await?;
    }
    outcome.links = link_rows.len();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use snsdb_core::PostCounters;

    use super::*;
    use crate::memory::MemoryStore;

    fn post(id: &str, caption: &str, likes: i64) -> NormalizedPost {
        NormalizedPost {
            external_id: id.to_string(),
            caption: Some(caption.to_string()),
            permalink: Some(format!("https://www.instagram.com/p/{id}/")),
            media_type: Some("Image".to_string()),
            posted_at: None,
            counters: PostCounters {
                likes: Some(likes),
                ..PostCounters::default()
            },
        }
    }

    fn tagged<'a>(post: &'a NormalizedPost, tags: &[&str]) -> TaggedPost<'a> {
        TaggedPost {
            post,
            hashtags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    fn clock() -> (NaiveDate, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();
        (now.date_naive(), now)
    }

    #[tokio::test]
    async fn rerunning_a_batch_converges() {
        let store = MemoryStore::new();
        let columns = TableColumns::known();
        let (today, now) = clock();
        let a = post("p1", "#グルメ #tokyo", 10);
        let b = post("p2", "#tokyo", 3);
        let batch = [tagged(&a, &["グルメ", "tokyo"]), tagged(&b, &["tokyo"])];

        let first = upsert_post_batch(&store, &columns, 7, &batch, today, now)
            .await
            .unwrap();
        upsert_post_batch(&store, &columns, 7, &batch, today, now)
            .await
            .unwrap();

        assert_eq!(
            first,
            PostBatchOutcome {
                posts: 2,
                metrics: 2,
                hashtags: 2,
                links: 3
            }
        );
        assert_eq!(store.rows(tables::POSTS).len(), 2);
        assert_eq!(store.rows(tables::POST_METRICS).len(), 2);
        assert_eq!(store.rows(tables::HASHTAGS).len(), 2);
        assert_eq!(store.rows(tables::POST_HASHTAGS).len(), 3);
        assert_eq!(store.rows(tables::POSTS)[0]["account_id"], 7);
    }

    #[tokio::test]
    async fn metrics_append_when_schema_lacks_metric_date() {
        let store = MemoryStore::new().with_columns(
            tables::POST_METRICS,
            &["id", "post_id", "likes", "comments", "views", "created_at"],
        );
        let columns = TableColumns::discover(&store).await;
        let (today, now) = clock();
        let a = post("p1", "no tags", 10);
        let batch = [tagged(&a, &[])];

        upsert_post_batch(&store, &columns, 1, &batch, today, now)
            .await
            .unwrap();
        upsert_post_batch(&store, &columns, 1, &batch, today, now)
            .await
            .unwrap();

        let metrics = store.rows(tables::POST_METRICS);
        assert_eq!(metrics.len(), 2);
        assert!(!metrics[0].contains_key("metric_date"));
        assert!(!metrics[0].contains_key("retweets"));
    }

    #[tokio::test]
    async fn duplicate_posts_in_one_batch_are_written_once() {
        let store = MemoryStore::new();
        let columns = TableColumns::known();
        let (today, now) = clock();
        let a = post("p1", "x", 1);
        let again = post("p1", "x", 2);
        let batch = [tagged(&a, &[]), tagged(&again, &[])];

        let outcome = upsert_post_batch(&store, &columns, 1, &batch, today, now)
            .await
            .unwrap();

        assert_eq!(outcome.posts, 1);
        assert_eq!(store.rows(tables::POST_METRICS)[0]["likes"], 1);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let store = MemoryStore::new();
        let (today, now) = clock();
        let outcome = upsert_post_batch(&store, &TableColumns::known(), 1, &[], today, now)
            .await
            .unwrap();
        assert_eq!(outcome, PostBatchOutcome::default());
        assert!(store.rows(tables::POSTS).is_empty());
    }
}
