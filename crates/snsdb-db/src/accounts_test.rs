use chrono::TimeZone;
use serde_json::json;

use super::*;
use crate::memory::MemoryStore;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap()
}

fn profile(user_id: &str, handle: &str, followers: i64) -> NormalizedProfile {
    NormalizedProfile {
        platform: Platform::Instagram,
        platform_user_id: user_id.to_string(),
        handle: handle.to_string(),
        display_name: Some("山田 花子".to_string()),
        biography: Some("東京のグルメ".to_string()),
        avatar_url: Some("https://cdn.example/a.jpg".to_string()),
        external_url: None,
        is_verified: false,
        is_business: false,
        followers: Some(followers),
        following: Some(100),
        posts: Some(20),
        profile_url: format!("https://www.instagram.com/{handle}/"),
    }
}

fn write<'a>(
    profile: &'a NormalizedProfile,
    keyword: Option<&'a str>,
    locale: &'a LocaleTags,
) -> AccountWrite<'a> {
    AccountWrite {
        profile,
        existing: None,
        keyword,
        avatar_url: "https://store.example/storage/v1/object/public/profile_images/instagram/1.jpg",
        locale,
        min_followers: 10_000,
        now: now(),
    }
}

/// Look the profile up, then write it, the way the ingest pipeline does.
async fn persist(
    store: &MemoryStore,
    profile: &NormalizedProfile,
    keyword: Option<&str>,
) -> Result<AccountRow, DbError> {
    let columns = TableColumns::known();
    let locale = LocaleTags::default();
    let existing = find_account(
        store,
        profile.platform,
        &profile.platform_user_id,
        &profile.handle,
    )
    .await?;
    let mut account = write(profile, keyword, &locale);
    account.existing = existing.as_ref();
    upsert_account(store, &columns, &account).await
}

#[test]
fn merge_keywords_dedupes_case_insensitively() {
    assert_eq!(
        merge_keywords(Some("Cafe, グルメ"), Some("cafe")),
        Some("Cafe, グルメ".to_string())
    );
    assert_eq!(
        merge_keywords(Some("グルメ"), Some("コスメ")),
        Some("グルメ, コスメ".to_string())
    );
    assert_eq!(merge_keywords(None, Some(" 旅行 ")), Some("旅行".to_string()));
    assert_eq!(merge_keywords(Some(" , "), None), None);
}

#[test]
fn account_row_parses_lenient_fields() {
    let Value::Object(row) = json!({
        "id": "12",
        "platform": "instagram",
        "account_name": "hanako",
        "keywords": "グルメ",
        "last_profile_scraped_at": "2026-04-01T00:00:00+00:00",
        "last_posts_scraped_at": "2026-04-01 08:00:00.123"
    }) else {
        unreachable!()
    };
    let account = AccountRow::from_row(&row).unwrap();
    assert_eq!(account.id, 12);
    assert!(account.last_profile_scraped_at.is_some());
    assert_eq!(
        account.last_posts_scraped_at,
        Some(Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap() + chrono::TimeDelta::milliseconds(123))
    );
}

#[tokio::test]
async fn upsert_account_refuses_profiles_below_floor() {
    let store = MemoryStore::new();
    let small = profile("1", "tiny", 9_999);

    let err = persist(&store, &small, Some("グルメ")).await.unwrap_err();

    assert!(matches!(err, DbError::BelowFollowerFloor { followers: 9_999, .. }));
    assert!(store.rows(tables::ACCOUNTS).is_empty());
}

#[tokio::test]
async fn repeated_upserts_merge_keywords_into_one_row() {
    let store = MemoryStore::new();
    let p = profile("1784", "hanako", 20_000);

    let first = persist(&store, &p, Some("グルメ")).await.unwrap();
    let second = persist(&store, &p, Some("カフェ")).await.unwrap();
    persist(&store, &p, Some("グルメ")).await.unwrap();

    assert_eq!(first.id, second.id);
    let rows = store.rows(tables::ACCOUNTS);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["keywords"], "グルメ, カフェ");
    assert_eq!(rows[0]["country"], "JP");
    assert_eq!(rows[0]["account_url"], "https://www.instagram.com/hanako/");
}

#[tokio::test]
async fn account_found_by_handle_gets_its_id_reconciled() {
    let store = MemoryStore::new();
    let Value::Object(seed) = json!({
        "platform": "instagram",
        "platform_user_id": "hanako",
        "account_name": "hanako",
        "keywords": "グルメ"
    }) else {
        unreachable!()
    };
    store.insert(tables::ACCOUNTS, vec![seed]);

    let p = profile("1784", "hanako", 20_000);
    let account = persist(&store, &p, Some("コスメ")).await.unwrap();

    let rows = store.rows(tables::ACCOUNTS);
    assert_eq!(rows.len(), 1);
    assert_eq!(account.platform_user_id.as_deref(), Some("1784"));
    assert_eq!(rows[0]["keywords"], "グルメ, コスメ");
}

#[tokio::test]
async fn metric_snapshot_is_idempotent_per_day() {
    let store = MemoryStore::new();
    let columns = TableColumns::known();
    let today = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();

    upsert_account_metric(&store, &columns, 1, today, &profile("1", "a", 20_000), now())
        .await
        .unwrap();
    upsert_account_metric(&store, &columns, 1, today, &profile("1", "a", 20_400), now())
        .await
        .unwrap();

    let rows = store.rows(tables::ACCOUNT_METRICS);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["followers"], 20_400);
    assert_eq!(rows[0]["metric_date"], "2026-04-02");
}

#[tokio::test]
async fn upsert_merges_into_the_row_it_is_given() {
    let store = MemoryStore::new();
    let columns = TableColumns::known();
    let locale = LocaleTags::default();
    let p = profile("1784", "hanako", 20_000);
    let first = persist(&store, &p, Some("グルメ")).await.unwrap();

    // The caller's lookup is authoritative; no second read happens here.
    let stale = AccountRow {
        keywords: Some("旅行".to_string()),
        ..first
    };
    let mut account = write(&p, Some("カフェ"), &locale);
    account.existing = Some(&stale);
    upsert_account(&store, &columns, &account).await.unwrap();

    let rows = store.rows(tables::ACCOUNTS);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["keywords"], "旅行, カフェ");
}

#[tokio::test]
async fn follower_series_is_newest_first_and_bounded() {
    let store = MemoryStore::new();
    let columns = TableColumns::known();
    for (day, followers) in [(1, 100), (2, 110), (3, 125), (4, 140), (5, 160)] {
        let date = NaiveDate::from_ymd_opt(2026, 4, day).unwrap();
        upsert_account_metric(&store, &columns, 9, date, &profile("1", "a", followers), now())
            .await
            .unwrap();
    }

    let series = recent_follower_series(&store, 9, 4).await.unwrap();
    let counts: Vec<i64> = series.iter().map(|p| p.followers).collect();
    assert_eq!(counts, vec![160, 140, 125, 110]);
    assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
}

#[tokio::test]
async fn follower_series_skips_unparseable_snapshots() {
    let store = MemoryStore::new();
    let snapshot = |date: &str, followers: Value| {
        into_row(json!({ "account_id": 9, "metric_date": date, "followers": followers }))
    };
    store.insert(
        tables::ACCOUNT_METRICS,
        vec![
            snapshot("2026-04-01", json!(100)),
            snapshot("2026-04-02", Value::Null),
            snapshot("garbage-date", json!(120)),
            snapshot("2026-04-03", json!("130")),
        ],
    );

    let series = recent_follower_series(&store, 9, 4).await.unwrap();
    let counts: Vec<i64> = series.iter().map(|p| p.followers).collect();
    assert_eq!(counts, vec![130, 100]);
}

#[tokio::test]
async fn keyword_candidates_match_tags_newest_first() {
    let store = MemoryStore::new();
    for (id, handle, kw) in [("1", "a", "グルメ"), ("2", "b", "コスメ"), ("3", "c", "グルメ")] {
        let p = profile(id, handle, 20_000);
        persist(&store, &p, Some(kw)).await.unwrap();
    }

    let candidates = list_keyword_candidates(&store, Platform::Instagram, "グルメ", 10)
        .await
        .unwrap();
    let handles: Vec<&str> = candidates.iter().map(|a| a.account_name.as_str()).collect();
    assert_eq!(handles, vec!["c", "a"]);

    let none = list_keyword_candidates(&store, Platform::Tiktok, "グルメ", 10)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn mark_posts_scraped_sets_timestamp() {
    let store = MemoryStore::new();
    let columns = TableColumns::known();
    let p = profile("1", "a", 20_000);
    let account = persist(&store, &p, None).await.unwrap();
    assert!(account.last_posts_scraped_at.is_none());

    mark_posts_scraped(&store, &columns, account.id, now())
        .await
        .unwrap();

    let found = find_account(&store, Platform::Instagram, "1", "a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.last_posts_scraped_at, Some(now()));
}
