//! Integration tests for the HTTP catalog against a mock server.
//!
//! Covers search parsing for both response formats, pagination, retry
//! bounds, non-retryable statuses, and rate-limit backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use recipe_finder_core::{
    CandidateRecipe, CatalogClient, CatalogError, CatalogFormat, HttpCatalog, RecipeCatalog,
    ResolutionConfig,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::{recipe_row, search_page, test_config};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

/// Responder that fails the first `fail_count` requests with `fail_status`, then succeeds.
struct FlakyResponder {
    requests: Arc<AtomicUsize>,
    fail_count: usize,
    fail_status: u16,
    body: String,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            let mut response = ResponseTemplate::new(self.fail_status);
            if self.fail_status == 429 {
                response = response.insert_header("Retry-After", "0");
            }
            response
        } else {
            ResponseTemplate::new(200).set_body_string(self.body.clone())
        }
    }
}

fn catalog(server: &MockServer) -> HttpCatalog {
    HttpCatalog::new(&test_config(&server.uri())).unwrap()
}

fn candidate_at(server: &MockServer, file: &str) -> CandidateRecipe {
    CandidateRecipe::new(file, "munki", "recipes", format!("{}/files/{file}", server.uri()))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

// ==================== Search Tests ====================

#[tokio::test]
async fn test_search_parses_web_rows_with_type_filter() {
    let server = require_mock_server!();
    let page = search_page(&[
        recipe_row("Firefox.munki.recipe", "munki", "recipes", "/files/Firefox.munki.recipe", 5),
        recipe_row(
            "Firefox.download.recipe",
            "download",
            "recipes",
            "/files/Firefox.download.recipe",
            50,
        ),
    ]);
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("search", "Firefox"))
        .and(query_param("type", "munki"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;

    let hits = catalog(&server).search("Firefox", Some("munki")).await;

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].name, "Firefox.munki.recipe");
    assert_eq!(hits[0].recipe_type, "munki");
    assert_eq!(hits[0].popularity, 5);
    assert_eq!(hits[0].repository, "recipes");
    assert_eq!(hits[1].popularity, 50);
}

#[tokio::test]
async fn test_search_parses_index_lines() {
    let server = require_mock_server!();
    let body = "name\trepository\tlocator\tstars\tbadge\n\
                Slack.munki.recipe\trecipes\tfiles/Slack.munki.recipe\t12\tmunki\n\
                \tnameless\tfiles/x\n\
                Slack.pkg.recipe\thomebysix-recipes\tfiles/Slack.pkg.recipe\t3\n";
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Slack"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let config = ResolutionConfig {
        catalog_format: CatalogFormat::Index,
        ..test_config(&server.uri())
    };
    let hits = HttpCatalog::new(&config).unwrap().search("Slack", None).await;

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].recipe_type, "munki");
    assert_eq!(hits[1].recipe_type, "pkg");
    assert_eq!(hits[1].repository, "homebysix-recipes");
}

#[tokio::test]
async fn test_search_follows_next_links() {
    let server = require_mock_server!();
    let first = search_page(&[recipe_row("A.munki.recipe", "munki", "recipes", "/files/A", 1)]);
    let second = search_page(&[recipe_row("B.munki.recipe", "munki", "recipes", "/files/B", 2)]);

    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(second))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("search", "App"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(first)
                .insert_header("Link", r#"</?search=App&page=2>; rel="next""#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hits = catalog(&server).search("App", None).await;
    let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["A.munki.recipe", "B.munki.recipe"]);
}

#[tokio::test]
async fn test_search_waits_for_quota_reset_between_pages() {
    let server = require_mock_server!();
    let first = search_page(&[recipe_row("A.munki.recipe", "munki", "recipes", "/files/A", 1)]);
    let second = search_page(&[recipe_row("B.munki.recipe", "munki", "recipes", "/files/B", 2)]);
    let reset = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 2;

    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(second))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("search", "App"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(first)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str())
                .insert_header("Link", r#"</?search=App&page=2>; rel="next""#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let started = Instant::now();
    let hits = catalog(&server).search("App", None).await;

    let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["A.munki.recipe", "B.munki.recipe"]);
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_search_stops_on_repeated_next_link() {
    let server = require_mock_server!();
    let page = search_page(&[recipe_row("A.munki.recipe", "munki", "recipes", "/files/A", 1)]);
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page)
                .insert_header("Link", r#"</?search=App>; rel="next""#),
        )
        .mount(&server)
        .await;

    let hits = catalog(&server).search("App", None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_search_failure_degrades_to_empty() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let hits = catalog(&server).search("Firefox", Some("munki")).await;
    assert!(hits.is_empty());
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_search_retries_transient_failure() {
    let server = require_mock_server!();
    let requests = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .respond_with(FlakyResponder {
            requests: Arc::clone(&requests),
            fail_count: 2,
            fail_status: 500,
            body: search_page(&[recipe_row("A.munki.recipe", "munki", "recipes", "/files/A", 1)]),
        })
        .mount(&server)
        .await;

    let hits = catalog(&server).search("A", None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

// ==================== Fetch Tests ====================

#[tokio::test]
async fn test_fetch_returns_body() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/files/Firefox.munki.recipe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<plist/>"))
        .mount(&server)
        .await;

    let content = catalog(&server)
        .fetch(&candidate_at(&server, "Firefox.munki.recipe"))
        .await
        .unwrap();
    assert_eq!(content, "<plist/>");
}

#[tokio::test]
async fn test_fetch_relative_locator_resolves_against_catalog() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/files/Zoom.download.recipe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("zoom"))
        .mount(&server)
        .await;

    let candidate = CandidateRecipe::new(
        "Zoom.download.recipe",
        "download",
        "recipes",
        "files/Zoom.download.recipe",
    );
    assert_eq!(catalog(&server).fetch(&candidate).await.unwrap(), "zoom");
}

#[tokio::test]
async fn test_fetch_gives_up_after_three_attempts() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = catalog(&server)
        .fetch(&candidate_at(&server, "Firefox.munki.recipe"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::HttpStatus { status: 500, .. }));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_fetch_not_found_is_not_retried() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = catalog(&server)
        .fetch(&candidate_at(&server, "Missing.munki.recipe"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::HttpStatus { status: 404, .. }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_fetch_rate_limit_does_not_consume_attempts() {
    let server = require_mock_server!();
    let requests = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .respond_with(FlakyResponder {
            requests: Arc::clone(&requests),
            fail_count: 2,
            fail_status: 429,
            body: "recipe".to_string(),
        })
        .mount(&server)
        .await;

    let config = ResolutionConfig {
        max_attempts: 1,
        ..test_config(&server.uri())
    };
    let content = HttpCatalog::new(&config)
        .unwrap()
        .fetch(&candidate_at(&server, "A.munki.recipe"))
        .await
        .unwrap();
    assert_eq!(content, "recipe");
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fetch_quota_exhausted_forbidden_waits_then_succeeds() {
    let server = require_mock_server!();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    Mock::given(method("GET"))
        .respond_with(move |_: &Request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("Retry-After", "0")
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        })
        .mount(&server)
        .await;

    let content = catalog(&server)
        .fetch(&candidate_at(&server, "A.munki.recipe"))
        .await
        .unwrap();
    assert_eq!(content, "ok");
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_plain_forbidden_is_permanent() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = CatalogClient::new(&test_config(&server.uri())).unwrap();
    let err = client.fetch("files/A.munki.recipe").await.unwrap_err();
    assert!(matches!(err, CatalogError::HttpStatus { status: 403, .. }));
    assert_eq!(request_count(&server).await, 1);
}
