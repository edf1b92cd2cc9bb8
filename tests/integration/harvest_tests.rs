//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the search and comment
//! endpoints and drive the fetcher, both walkers and the full harvest.

use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use thread_harvest::config::{
    CollectionConfig, Config, DiscoveryConfig, FilterConfig, HttpConfig, OutputConfig,
    UserAgentConfig,
};
use thread_harvest::crawler::{collect, discover, ApiClient, FetchError, WalkContext};
use thread_harvest::storage::{read_jsonl, ChildRecord, FileLedger, ParentDescriptor, ResumeLedger};
use thread_harvest::{HarvestError, Harvester, PatternFilter, StopReason};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAY: i64 = 86_400;

fn http_config(max_attempts: u32) -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_attempts,
        backoff_ceiling_secs: 0.0,
        jitter_max_secs: 0.0,
        page_delay_ms: 0,
    }
}

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestHarvester".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn client(max_attempts: u32) -> ApiClient {
    ApiClient::new(&http_config(max_attempts), &user_agent()).expect("client")
}

fn discovery_config(endpoint: String, target_count: usize, max_age_days: u32) -> DiscoveryConfig {
    DiscoveryConfig {
        endpoint,
        query: "Game Thread".to_string(),
        restrict_scope: true,
        target_count,
        max_age_days,
        page_size: 100,
    }
}

fn collection_config(endpoint: String, max_pages: u32, stall_limit: u32) -> CollectionConfig {
    CollectionConfig {
        endpoint,
        page_size: 100,
        max_pages,
        stall_limit,
    }
}

fn game_thread_filter() -> PatternFilter {
    PatternFilter::new(
        r"(?i)\bgame thread\b",
        &[
            r"(?i)\bpost[- ]?game\b".to_string(),
            r"(?i)\bpre[- ]?game\b".to_string(),
        ],
    )
    .expect("filter")
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Search listing body with `(id, title, created_utc)` items
fn search_page(items: &[(&str, &str, i64)], after: Option<&str>) -> Value {
    let children: Vec<Value> = items
        .iter()
        .map(|(id, title, created)| {
            json!({
                "kind": "t3",
                "data": {
                    "id": id,
                    "title": title,
                    "created_utc": *created as f64,
                    "permalink": format!("/r/test/comments/{}/", id),
                }
            })
        })
        .collect();
    json!({ "kind": "Listing", "data": { "children": children, "after": after } })
}

/// Comment page body, one comment per timestamp (newest first)
fn comment_page(timestamps: impl IntoIterator<Item = i64>) -> Value {
    let data: Vec<Value> = timestamps
        .into_iter()
        .map(|ts| json!({ "id": format!("c{}", ts), "body": format!("comment {}", ts), "created_utc": ts }))
        .collect();
    json!({ "data": data })
}

fn json_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

async fn before_params(server: &MockServer) -> Vec<Option<i64>> {
    server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "before")
                .map(|(_, value)| value.parse().expect("numeric before"))
        })
        .collect()
}

// ===== Resilient HTTP client =====

#[tokio::test]
async fn test_fetch_gives_up_after_exactly_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let result = client(4)
        .fetch_json::<Value>(&format!("{}/flaky", server.uri()), &[])
        .await;

    match result {
        Err(FetchError::Exhausted {
            attempts,
            last_cause,
            ..
        }) => {
            assert_eq!(attempts, 4);
            assert!(last_cause.contains("503"));
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_retries_throttling_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("q", "habs"))
        .respond_with(json_response(json!({"ok": true})))
        .mount(&server)
        .await;

    let value: Value = client(3)
        .fetch_json(&format!("{}/api", server.uri()), &[("q", "habs".to_string())])
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_terminal_status_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(5)
        .fetch_json::<Value>(&format!("{}/missing", server.uri()), &[])
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_fetch_malformed_body_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(5)
        .fetch_json::<Value>(&format!("{}/garbled", server.uri()), &[])
        .await;

    assert!(matches!(result, Err(FetchError::Parse { .. })));
}

#[tokio::test]
async fn test_fetch_connection_refused_is_exhausted() {
    // Bind then drop a listener so its port refuses connections
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let result = client(2).fetch_json::<Value>(&uri, &[]).await;

    assert!(matches!(
        result,
        Err(FetchError::Exhausted { attempts: 2, .. })
    ));
}

// ===== Discovery walker =====

#[tokio::test]
async fn test_discovery_stops_at_target_without_next_page() {
    let server = MockServer::start().await;
    let t = now() - 3600;

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("after", "p2"))
        .respond_with(json_response(search_page(&[("z", "Game Thread", t)], None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("sort", "new"))
        .and(query_param("t", "all"))
        .and(query_param("q", "Game Thread"))
        .respond_with(json_response(search_page(
            &[
                ("a", "Game Thread: MTL @ TOR", t),
                ("n", "Lineup news", t - 10),
                ("b", "Game Thread: BOS @ MTL", t - 20),
                ("c", "Game Thread: MTL @ OTT", t - 30),
            ],
            Some("p2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = discovery_config(format!("{}/search.json", server.uri()), 2, 30);

    let outcome = discover(&ctx, &config, &game_thread_filter()).await.unwrap();

    let ids: Vec<_> = outcome.parents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(outcome.stop, StopReason::TargetReached);
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(
        outcome.parents[0].extra["permalink"],
        json!("/r/test/comments/a/")
    );
}

#[tokio::test]
async fn test_discovery_early_time_cutoff() {
    let server = MockServer::start().await;
    let t = now() - 3600;
    let too_old = now() - 40 * DAY;

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("after", "p3"))
        .respond_with(json_response(search_page(&[], None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("after", "p2"))
        .respond_with(json_response(search_page(
            &[
                ("d", "Game Thread 4", t - 300),
                ("e", "Game Thread 5", t - 400),
                ("f", "Game Thread 6", t - 500),
                ("g", "Game Thread 7", t - 600),
                ("old", "Game Thread ancient", too_old),
                ("h", "Game Thread out of order", t - 700),
            ],
            Some("p3"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(json_response(search_page(
            &[
                ("a", "Game Thread 1", t),
                ("x", "Post Game Thread 1", t - 50),
                ("b", "Game Thread 2", t - 100),
                ("c", "Game Thread 3", t - 200),
            ],
            Some("p2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = discovery_config(format!("{}/search.json", server.uri()), 100, 30);

    let outcome = discover(&ctx, &config, &game_thread_filter()).await.unwrap();

    let ids: Vec<_> = outcome.parents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e", "f", "g"]);
    assert_eq!(outcome.stop, StopReason::CutoffReached);
    assert_eq!(outcome.pages_fetched, 2);
}

#[tokio::test]
async fn test_discovery_never_returns_excluded_titles() {
    let server = MockServer::start().await;
    let t = now() - 60;

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(json_response(search_page(
            &[
                ("a", "Post Game Thread: MTL 3 - TOR 2", t),
                ("b", "Pre-Game Thread: MTL vs TOR", t - 1),
                ("c", "Game Thread: MTL vs TOR", t - 2),
                ("d", "POSTGAME game thread", t - 3),
            ],
            None,
        )))
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = discovery_config(format!("{}/search.json", server.uri()), 10, 30);

    let outcome = discover(&ctx, &config, &game_thread_filter()).await.unwrap();

    let ids: Vec<_> = outcome.parents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_discovery_collapses_duplicates_across_pages() {
    let server = MockServer::start().await;
    let t = now() - 60;

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("after", "p2"))
        .respond_with(json_response(search_page(
            &[("a", "Game Thread (edited)", t - 5), ("b", "Game Thread B", t - 6)],
            Some("p3"),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("after", "p3"))
        .respond_with(json_response(search_page(&[], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(json_response(search_page(
            &[("a", "Game Thread A", t)],
            Some("p2"),
        )))
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = discovery_config(format!("{}/search.json", server.uri()), 10, 30);

    let outcome = discover(&ctx, &config, &game_thread_filter()).await.unwrap();

    assert_eq!(outcome.parents.len(), 2);
    assert_eq!(outcome.parents[0].title, "Game Thread A");
    assert_eq!(outcome.parents[1].id, "b");
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.pages_fetched, 3);
}

#[tokio::test]
async fn test_discovery_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = discovery_config(format!("{}/search.json", server.uri()), 10, 30);

    let result = discover(&ctx, &config, &game_thread_filter()).await;

    assert!(matches!(result, Err(FetchError::Exhausted { .. })));
}

// ===== Collection walker =====

#[tokio::test]
async fn test_collection_walks_all_pages_with_strict_watermark() {
    let server = MockServer::start().await;

    // 100 / 100 / 40 comments; the endpoint treats `before` as inclusive
    let page1: Vec<i64> = (9901..=10000).rev().collect();
    let page2: Vec<i64> = (9801..=9900).rev().collect();
    let page3: Vec<i64> = (9761..=9800).rev().collect();

    for (before, body) in [
        ("9900", comment_page(page2.clone())),
        ("9800", comment_page(page3.clone())),
        ("9760", comment_page(Vec::new())),
    ] {
        Mock::given(method("GET"))
            .and(path("/comments"))
            .and(query_param("link_id", "t1"))
            .and(query_param("before", before))
            .respond_with(json_response(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t1"))
        .and(query_param("sort", "desc"))
        .and(query_param("sort_type", "created_utc"))
        .and(query_param("size", "100"))
        .respond_with(json_response(comment_page(page1.clone())))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 50, 3);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.records.len(), 240);
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.pages_fetched, 4);
    assert!(outcome.records.iter().all(|r| r.thread_id == "t1"));
    assert_eq!(outcome.records[0].created_utc, Some(10000));
    assert_eq!(outcome.records[239].created_utc, Some(9761));

    let befores = before_params(&server).await;
    assert_eq!(befores, vec![None, Some(9900), Some(9800), Some(9760)]);

    // Each watermark is strictly below the oldest comment of the page before it
    let oldest_per_page = [page1[99], page2[99], page3[39]];
    for (watermark, oldest) in befores[1..].iter().zip(oldest_per_page) {
        assert!(watermark.unwrap() < oldest);
    }
    assert_eq!(befores[1], Some(page1[99] - 1));
}

#[tokio::test]
async fn test_collection_stops_after_stall_limit() {
    let server = MockServer::start().await;
    let page: Vec<i64> = (401..=500).rev().collect();

    // Ignores `before` and keeps serving the same page
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(json_response(comment_page(page)))
        .expect(4)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 50, 3);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.stop, StopReason::Stalled);
    assert_eq!(outcome.pages_fetched, 4);
    assert_eq!(outcome.records.len(), 100);
    assert_eq!(
        before_params(&server).await,
        vec![None, Some(400), Some(400), Some(400)]
    );
}

#[tokio::test]
async fn test_collection_newer_page_never_raises_watermark() {
    let server = MockServer::start().await;

    // Reachable only if the watermark climbs back up after a newer page
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "149"))
        .respond_with(json_response(comment_page([110, 101])))
        .expect(0)
        .mount(&server)
        .await;
    // Ignores the watermark and answers with comments newer than page 1
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "100"))
        .respond_with(json_response(comment_page([160, 150])))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(json_response(comment_page([120, 101])))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 9, 3);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.stop, StopReason::Stalled);
    assert_eq!(outcome.pages_fetched, 4);
    let timestamps: Vec<_> = outcome.records.iter().filter_map(|r| r.created_utc).collect();
    assert_eq!(timestamps, vec![120, 101]);

    let befores = before_params(&server).await;
    assert_eq!(befores, vec![None, Some(100), Some(100), Some(100)]);
    for pair in befores[1..].windows(2) {
        assert!(pair[1] <= pair[0], "watermark went up: {:?}", befores);
    }
}

#[tokio::test]
async fn test_collection_missing_timestamp_counts_as_stall() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(json_response(json!({
            "data": [{"body": "no timestamp here"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 50, 2);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.stop, StopReason::Stalled);
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_collection_stall_counter_resets_on_progress() {
    let server = MockServer::start().await;

    // before=99: one repeat of page 1, then real progress
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "99"))
        .respond_with(json_response(comment_page([101, 100])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "99"))
        .respond_with(json_response(comment_page([60, 50])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // before=49: one repeat of page 3, then the end
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "49"))
        .respond_with(json_response(comment_page([55, 50])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "49"))
        .respond_with(json_response(comment_page([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(json_response(comment_page([101, 100])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 50, 2);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    let timestamps: Vec<_> = outcome.records.iter().filter_map(|r| r.created_utc).collect();
    assert_eq!(timestamps, vec![101, 100, 60, 50]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.pages_fetched, 5);
}

#[tokio::test]
async fn test_collection_page_limit_is_normal_termination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "19"))
        .respond_with(json_response(comment_page([10])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("before", "29"))
        .respond_with(json_response(comment_page([20])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(json_response(comment_page([30])))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 2, 3);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.stop, StopReason::PageLimit);
    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test]
async fn test_collection_terminal_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let http = client(3);
    let cancel = CancellationToken::new();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 5, 3);

    let result = collect(&ctx, &config, "t1").await;

    assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
}

#[tokio::test]
async fn test_collection_honours_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(json_response(comment_page([1])))
        .expect(0)
        .mount(&server)
        .await;

    let http = client(2);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = WalkContext {
        client: &http,
        page_delay: Duration::ZERO,
        cancel: &cancel,
    };
    let config = collection_config(format!("{}/comments", server.uri()), 5, 3);

    let outcome = collect(&ctx, &config, "t1").await.unwrap();

    assert_eq!(outcome.stop, StopReason::Cancelled);
    assert!(outcome.records.is_empty());
}

// ===== Full harvest =====

fn harvest_config(server: &MockServer, dir: &TempDir) -> Config {
    let out = |name: &str| dir.path().join(name).display().to_string();
    Config {
        discovery: discovery_config(format!("{}/search.json", server.uri()), 10, 30),
        filter: FilterConfig {
            primary: r"(?i)\bgame thread\b".to_string(),
            exclude: vec![r"(?i)\bpost[- ]?game\b".to_string()],
        },
        collection: collection_config(format!("{}/comments", server.uri()), 10, 3),
        http: http_config(2),
        user_agent: user_agent(),
        output: OutputConfig {
            parents_path: out("threads.jsonl"),
            records_path: out("comments.jsonl"),
            ledger_path: out("state/done.txt"),
            export_path: out("train.txt"),
        },
    }
}

/// Three threads: t1 has two comment pages, t2 is forbidden, t3 has one page
async fn mount_three_threads(server: &MockServer) {
    let t = now() - 3600;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(json_response(search_page(
            &[
                ("t1", "Game Thread 1", t),
                ("pg", "Post Game Thread 1", t - 1),
                ("t2", "Game Thread 2", t - 2),
                ("t3", "Game Thread 3", t - 3),
            ],
            None,
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t1"))
        .and(query_param("before", "199"))
        .respond_with(json_response(comment_page([150])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t1"))
        .and(query_param("before", "149"))
        .respond_with(json_response(comment_page([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t1"))
        .respond_with(json_response(comment_page([300, 200])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t3"))
        .and(query_param("before", "899"))
        .respond_with(json_response(comment_page([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "t3"))
        .respond_with(json_response(comment_page([900])))
        .mount(server)
        .await;
}

fn thread_ids_in(records_path: &str) -> Vec<String> {
    read_jsonl::<ChildRecord>(Path::new(records_path))
        .unwrap()
        .into_iter()
        .map(|r| r.thread_id)
        .collect()
}

#[tokio::test]
async fn test_harvest_isolates_failing_thread() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_three_threads(&server).await;
    let config = harvest_config(&server, &dir);

    let mut harvester = Harvester::new(config.clone()).unwrap();
    let summary = harvester.run().await.expect("harvest succeeds");

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.records_written, 4);
    assert!(!summary.cancelled);

    let done = FileLedger::new(Path::new(&config.output.ledger_path))
        .load()
        .unwrap();
    assert!(done.contains("t1"));
    assert!(done.contains("t3"));
    assert!(!done.contains("t2"), "failed thread must not be marked done");

    assert_eq!(
        thread_ids_in(&config.output.records_path),
        vec!["t1", "t1", "t1", "t3"]
    );

    let parents: Vec<ParentDescriptor> =
        read_jsonl(Path::new(&config.output.parents_path)).unwrap();
    let ids: Vec<_> = parents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn test_harvest_resume_skips_ledger_entries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = harvest_config(&server, &dir);

    let t = now() - 3600;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(json_response(search_page(
            &[("p", "Game Thread P", t), ("q", "Game Thread Q", t - 1)],
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "p"))
        .respond_with(json_response(comment_page([10])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "q"))
        .and(query_param("before", "19"))
        .respond_with(json_response(comment_page([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("link_id", "q"))
        .respond_with(json_response(comment_page([20])))
        .expect(1)
        .mount(&server)
        .await;

    FileLedger::new(Path::new(&config.output.ledger_path))
        .mark_done("p")
        .unwrap();

    let first = Harvester::new(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.skipped_done, 1);
    assert_eq!(first.completed, 1);

    // A second run finds everything in the ledger
    let second = Harvester::new(config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.skipped_done, 2);
    assert_eq!(second.completed, 0);
    assert_eq!(second.records_written, 0);

    assert_eq!(thread_ids_in(&config.output.records_path), vec!["q"]);
    let parents: Vec<ParentDescriptor> =
        read_jsonl(Path::new(&config.output.parents_path)).unwrap();
    assert_eq!(parents.len(), 2, "descriptors are not duplicated on resume");
}

#[tokio::test]
async fn test_harvest_discovery_failure_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = harvest_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = Harvester::new(config.clone()).unwrap().run().await;

    assert!(matches!(
        result,
        Err(HarvestError::Fetch(FetchError::Exhausted { .. }))
    ));
    assert!(!Path::new(&config.output.parents_path).exists());
    assert!(!Path::new(&config.output.records_path).exists());
}

#[tokio::test]
async fn test_harvest_cancelled_before_start_writes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_three_threads(&server).await;
    let config = harvest_config(&server, &dir);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = Harvester::new(config.clone())
        .unwrap()
        .with_cancellation(cancel)
        .run()
        .await;

    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!Path::new(&config.output.ledger_path).exists());
}

#[tokio::test]
async fn test_harvest_warns_but_continues_on_config_change() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_three_threads(&server).await;
    let config = harvest_config(&server, &dir);

    Harvester::new(config.clone())
        .unwrap()
        .with_config_hash("first")
        .run()
        .await
        .unwrap();
    let second = Harvester::new(config.clone())
        .unwrap()
        .with_config_hash("second")
        .run()
        .await
        .unwrap();

    // Only the previously failing thread is attempted again
    assert_eq!(second.skipped_done, 2);
    assert_eq!(second.failed, 1);

    let stamp = std::fs::read_to_string(format!("{}.config-hash", config.output.ledger_path))
        .unwrap();
    assert_eq!(stamp.trim(), "second");
}
