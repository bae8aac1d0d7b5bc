//! Integration tests for `ApifyClient`.
//!
//! Each test stands up a `wiremock` server in place of the Apify API so no
//! real network traffic is made.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snsdb_core::{Platform, ScraperSettings};
use snsdb_scraper::{ApifyClient, ScrapeQuery, Scraper, ScraperError};

const TOKEN: &str = "apify-test-token";

fn test_client(server: &MockServer) -> ApifyClient {
    let settings = ScraperSettings {
        base_url: server.uri(),
        timeout_secs: 5,
        poll_interval_secs: 0,
        max_polls: 3,
        ..ScraperSettings::default()
    };
    ApifyClient::new(TOKEN, settings).expect("failed to build test ApifyClient")
}

fn discover(keyword: &str) -> ScrapeQuery {
    ScrapeQuery::DiscoverProfiles {
        keyword: keyword.to_string(),
        limit: 10,
    }
}

fn search(keyword: &str) -> ScrapeQuery {
    ScrapeQuery::SearchContent {
        keyword: keyword.to_string(),
        limit: 10,
    }
}

// ---------------------------------------------------------------------------
// Synchronous actors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_run_returns_dataset_items() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/apify~instagram-scraper/run-sync-get-dataset-items"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_partial_json(json!({"search": "グルメ", "searchType": "user"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"username": "a"}, {"username": "b"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server)
        .run(Platform::Instagram, &discover("グルメ"))
        .await
        .expect("sync run should succeed");

    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["username"], "b");
}

#[tokio::test]
async fn sync_run_non_success_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/apidojo~tweet-scraper/run-sync-get-dataset-items"))
        .respond_with(ResponseTemplate::new(402).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .run(Platform::X, &search("コスメ"))
        .await
        .expect_err("402 should be an error");

    match err {
        ScraperError::UnexpectedStatus { status, body, .. } => {
            assert_eq!(status, 402);
            assert!(body.contains("quota"), "body was: {body}");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn sync_run_object_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/apidojo~tweet-scraper/run-sync-get-dataset-items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "bad input"})))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .run(Platform::X, &search("コスメ"))
        .await
        .expect_err("object body should be rejected");

    assert!(
        matches!(err, ScraperError::Malformed { .. }),
        "expected Malformed, got {err:?}"
    );
}

#[tokio::test]
async fn sync_run_invalid_json_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/apify~instagram-scraper/run-sync-get-dataset-items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .run(Platform::Instagram, &discover("グルメ"))
        .await
        .expect_err("html body should be rejected");

    assert!(
        matches!(err, ScraperError::Deserialize { .. }),
        "expected Deserialize, got {err:?}"
    );
}

#[tokio::test]
async fn unsupported_query_never_reaches_the_network() {
    let server = MockServer::start().await;

    let err = test_client(&server)
        .run(Platform::Tiktok, &discover("グルメ"))
        .await
        .expect_err("tiktok has no profile discovery actor");

    assert!(matches!(err, ScraperError::UnsupportedQuery { .. }));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ---------------------------------------------------------------------------
// Asynchronous actors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_run_polls_until_succeeded_then_reads_dataset() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/clockworks~tiktok-scraper/runs"))
        .and(body_partial_json(json!({"searchQueries": ["グルメ"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "run-1", "status": "RUNNING", "defaultDatasetId": "ds-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "run-1", "status": "SUCCEEDED", "defaultDatasetId": "ds-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .and(query_param("clean", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "v1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server)
        .run(Platform::Tiktok, &search("グルメ"))
        .await
        .expect("async run should succeed");

    assert_eq!(items, vec![json!({"id": "v1"})]);
}

#[tokio::test]
async fn async_run_failure_carries_log_tail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/clockworks~tiktok-scraper/runs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "run-2", "status": "FAILED", "defaultDatasetId": "ds-2"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logs/run-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("boot\nproxy blocked"))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .run(Platform::Tiktok, &search("グルメ"))
        .await
        .expect_err("failed run should be an error");

    match err {
        ScraperError::RunFailed {
            run_id,
            status,
            log_tail,
        } => {
            assert_eq!(run_id, "run-2");
            assert_eq!(status, "FAILED");
            assert!(log_tail.ends_with("proxy blocked"));
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn async_run_gives_up_after_max_polls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/clockworks~tiktok-scraper/runs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "run-3", "status": "READY"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "run-3", "status": "RUNNING"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_client(&server)
        .run(Platform::Tiktok, &search("グルメ"))
        .await
        .expect_err("endless run should time out");

    assert!(
        matches!(err, ScraperError::RunTimedOut { polls: 3, .. }),
        "expected RunTimedOut, got {err:?}"
    );
}
