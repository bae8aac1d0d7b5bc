//! `RestStore` and `SupabaseStorage` against a `wiremock` stand-in for
//! Supabase.

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snsdb_core::Platform;
use snsdb_db::{DbError, ImageStore, Query, RestStore, Row, Store, SupabaseStorage};

const KEY: &str = "service-role-key";

fn store(server: &MockServer) -> RestStore {
    RestStore::new(&server.uri(), KEY, 5).expect("failed to build RestStore")
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => panic!("test rows are objects"),
    }
}

// ---------------------------------------------------------------------------
// Table operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_translates_query_to_postgrest_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/accounts_metrics"))
        .and(header("apikey", KEY))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
        .and(query_param("select", "metric_date,followers"))
        .and(query_param("account_id", "eq.7"))
        .and(query_param("order", "metric_date.desc"))
        .and(query_param("limit", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"metric_date": "2026-04-02", "followers": 120},
            {"metric_date": "2026-04-01", "followers": 100}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::new()
        .select(&["metric_date", "followers"])
        .eq("account_id", 7)
        .order_desc("metric_date")
        .limit(4);
    let rows = store(&server).get("accounts_metrics", &query).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["followers"], 120);
}

#[tokio::test]
async fn upsert_sends_conflict_and_merge_preference() {
    let server = MockServer::start().await;
    let payload = json!([{"account_id": 1, "metric_date": "2026-04-02", "followers": 10}]);

    Mock::given(method("POST"))
        .and(path("/rest/v1/accounts_metrics"))
        .and(query_param("on_conflict", "account_id,metric_date"))
        .and(header(
            "prefer",
            "resolution=merge-duplicates,return=representation",
        ))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": 55, "account_id": 1, "metric_date": "2026-04-02", "followers": 10}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = [row(payload[0].clone())];
    let written = store(&server)
        .upsert("accounts_metrics", &rows, Some(&["account_id", "metric_date"]))
        .await
        .unwrap();

    assert_eq!(written[0]["id"], 55);
}

#[tokio::test]
async fn upsert_of_nothing_makes_no_request() {
    let server = MockServer::start().await;

    let written = store(&server).upsert("posts", &[], None).await.unwrap();

    assert!(written.is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn patch_filters_by_query() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/sns_accounts"))
        .and(query_param("id", "eq.3"))
        .and(body_json(json!({"last_posts_scraped_at": "2026-04-02T00:00:00+00:00"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .patch(
            "sns_accounts",
            &Query::new().eq("id", 3),
            &row(json!({"last_posts_scraped_at": "2026-04-02T00:00:00+00:00"})),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn error_status_is_surfaced_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/posts"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"message":"column \"foo\" does not exist"}"#),
        )
        .mount(&server)
        .await;

    let err = store(&server)
        .upsert("posts", &[row(json!({"foo": 1}))], Some(&["external_post_id"]))
        .await
        .unwrap_err();

    match err {
        DbError::Api { status, table, body } => {
            assert_eq!(status, 400);
            assert_eq!(table, "posts");
            assert!(body.contains("does not exist"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn columns_are_sampled_from_one_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/post_metrics"))
        .and(query_param("select", "*"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1, "post_id": 2, "likes": 3}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/hashtags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let s = store(&server);
    let columns = s.columns("post_metrics").await.unwrap().unwrap();
    assert!(columns.contains("likes"));
    assert!(!columns.contains("metric_date"));
    assert!(s.columns("hashtags").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Image storage
// ---------------------------------------------------------------------------

fn storage(server: &MockServer) -> SupabaseStorage {
    SupabaseStorage::new(&server.uri(), KEY, "profile_images", 5)
        .expect("failed to build SupabaseStorage")
}

#[tokio::test]
async fn image_is_copied_and_public_url_returned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdn/avatar"))
        .and(header("referer", "https://www.instagram.com/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/profile_images/instagram/1784.png"))
        .and(header("x-upsert", "true"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let images = storage(&server);
    let url = images
        .put(
            Platform::Instagram,
            &format!("{}/cdn/avatar", server.uri()),
            "1784",
        )
        .await
        .expect("copy should succeed");

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/public/profile_images/instagram/1784.png",
            server.uri()
        )
    );
    assert!(images.is_durable(&url));
}

#[tokio::test]
async fn non_image_download_is_not_uploaded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdn/avatar"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>login</html>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = storage(&server)
        .put(Platform::Tiktok, &format!("{}/cdn/avatar", server.uri()), "u1")
        .await;

    assert!(result.is_none());
}

#[tokio::test]
async fn failed_upload_yields_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdn/avatar.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8]),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/profile_images/x/42.jpg"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let result = storage(&server)
        .put(Platform::X, &format!("{}/cdn/avatar.jpg", server.uri()), "42")
        .await;

    assert!(result.is_none());
}

#[tokio::test]
async fn durable_url_is_returned_without_requests() {
    let server = MockServer::start().await;
    let images = storage(&server);
    let durable = format!(
        "{}/storage/v1/object/public/profile_images/x/42.jpg",
        server.uri()
    );

    assert_eq!(
        images.put(Platform::X, &durable, "42").await.as_deref(),
        Some(durable.as_str())
    );
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
