//! End-to-end engine tests: mock catalog over HTTP, real output tree on disk.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use recipe_finder_core::{
    CandidateRecipe, CatalogError, HttpCatalog, RecipeCatalog, ResolutionConfig, ResolutionStatus,
    RetrievalEngine, RunReport,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::{plist_recipe, recipe_row, search_page, test_config};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

async fn mount_search(server: &MockServer, query: &str, rows: &[String]) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("search", query))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(rows)))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, file_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts catalog entries for Firefox: munki (5 stars) child of download (50 stars).
async fn mount_firefox(server: &MockServer) {
    mount_search(
        server,
        "Firefox",
        &[
            recipe_row(
                "Firefox.download.recipe",
                "download",
                "recipes",
                "/files/Firefox.download.recipe",
                50,
            ),
            recipe_row(
                "Firefox.munki.recipe",
                "munki",
                "recipes",
                "/files/Firefox.munki.recipe",
                5,
            ),
        ],
    )
    .await;
    mount_search(
        server,
        "com.github.autopkg.download.Firefox",
        &[recipe_row(
            "Firefox.download.recipe",
            "download",
            "recipes",
            "/files/Firefox.download.recipe",
            50,
        )],
    )
    .await;
    mount_file(
        server,
        "/files/Firefox.munki.recipe",
        plist_recipe(
            "com.github.autopkg.munki.Firefox",
            Some("com.github.autopkg.download.Firefox"),
        ),
    )
    .await;
    mount_file(
        server,
        "/files/Firefox.download.recipe",
        plist_recipe("com.github.autopkg.download.Firefox", None),
    )
    .await;
}

fn engine(server: &MockServer, output: &Path) -> RetrievalEngine {
    let config = test_config(&server.uri());
    let catalog = HttpCatalog::new(&config).unwrap();
    RetrievalEngine::new(config, Arc::new(catalog), output)
}

// ==================== Scenario Tests ====================

#[tokio::test]
async fn test_priority_type_wins_and_chain_is_written() {
    let server = require_mock_server!();
    mount_firefox(&server).await;
    let output = TempDir::new().unwrap();

    let outcomes = engine(&server, output.path()).process(&["Firefox".to_string()]).await;
    let outcome = &outcomes[0];

    assert_eq!(outcome.status, ResolutionStatus::FoundAndRetrieved);
    assert_eq!(outcome.selected.as_ref().unwrap().name, "Firefox.munki.recipe");
    let chain: Vec<_> = outcome.chain.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(chain, vec!["Firefox.munki.recipe", "Firefox.download.recipe"]);
    assert!(outcome.chain_complete);
    assert_eq!(
        outcome.local_paths,
        vec![
            "com.github.autopkg.recipes/Firefox/Firefox.munki.recipe",
            "com.github.autopkg.recipes/Firefox/Firefox.download.recipe",
        ]
    );
    for relative in &outcome.local_paths {
        assert!(output.path().join(relative).is_file(), "missing {relative}");
    }
}

#[tokio::test]
async fn test_only_deprecated_candidates_is_not_found() {
    let server = require_mock_server!();
    mount_search(
        &server,
        "Zoom",
        &[recipe_row("Zoom.munki.recipe", "deprecated", "recipes", "/files/Zoom.munki.recipe", 90)],
    )
    .await;
    let output = TempDir::new().unwrap();

    let outcomes = engine(&server, output.path()).process(&["Zoom".to_string()]).await;
    assert_eq!(outcomes[0].status, ResolutionStatus::NotFound);
    assert!(outcomes[0].selected.is_none());
    assert!(outcomes[0].chain.is_empty());
}

#[tokio::test]
async fn test_self_referencing_parent_terminates_with_note() {
    let server = require_mock_server!();
    mount_search(
        &server,
        "Tool",
        &[recipe_row("Tool.munki.recipe", "munki", "recipes", "/files/Tool.munki.recipe", 1)],
    )
    .await;
    mount_search(
        &server,
        "Base.download.recipe",
        &[recipe_row(
            "Base.download.recipe",
            "download",
            "recipes",
            "/files/Base.download.recipe",
            1,
        )],
    )
    .await;
    mount_file(
        &server,
        "/files/Tool.munki.recipe",
        plist_recipe("com.example.munki.Tool", Some("Base.download.recipe")),
    )
    .await;
    mount_file(
        &server,
        "/files/Base.download.recipe",
        plist_recipe("com.example.download.Base", Some("Base.download.recipe")),
    )
    .await;
    let output = TempDir::new().unwrap();

    let outcomes = engine(&server, output.path()).process(&["Tool".to_string()]).await;
    let outcome = &outcomes[0];

    assert_eq!(outcome.status, ResolutionStatus::FoundAndRetrieved);
    let chain: Vec<_> = outcome.chain.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(chain, vec!["Tool.munki.recipe", "Base.download.recipe"]);
    assert!(!outcome.chain_complete);
    assert!(outcome.notes.iter().any(|n| n.contains("incomplete chain")));
}

#[tokio::test]
async fn test_root_fetch_failure_is_found_not_retrieved() {
    let server = require_mock_server!();
    mount_search(
        &server,
        "Slack",
        &[recipe_row("Slack.munki.recipe", "munki", "recipes", "/files/Slack.munki.recipe", 1)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/Slack.munki.recipe"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let output = TempDir::new().unwrap();

    let outcomes = engine(&server, output.path()).process(&["Slack".to_string()]).await;
    let outcome = &outcomes[0];

    assert_eq!(outcome.status, ResolutionStatus::FoundNotRetrieved);
    assert!(outcome.chain.is_empty());
    assert!(outcome.local_paths.is_empty());
    assert!(outcome.error_detail.as_deref().unwrap().contains("500"));
}

// ==================== Output Tree Tests ====================

#[tokio::test]
async fn test_rerun_reuses_identical_files() {
    let server = require_mock_server!();
    mount_firefox(&server).await;
    let output = TempDir::new().unwrap();
    let apps = vec!["Firefox".to_string()];

    let first = engine(&server, output.path()).process(&apps).await;
    let second = engine(&server, output.path()).process(&apps).await;

    assert_eq!(first[0].local_paths, second[0].local_paths);
    assert!(second[0].notes.is_empty());
}

#[tokio::test]
async fn test_collision_keeps_existing_file() {
    let server = require_mock_server!();
    mount_firefox(&server).await;
    let output = TempDir::new().unwrap();
    let existing = output
        .path()
        .join("com.github.autopkg.recipes/Firefox/Firefox.munki.recipe");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "locally edited").unwrap();

    let outcomes = engine(&server, output.path()).process(&["Firefox".to_string()]).await;
    let outcome = &outcomes[0];

    assert_eq!(outcome.status, ResolutionStatus::FoundAndRetrieved);
    assert!(outcome.notes.iter().any(|n| n.starts_with("collision")));
    assert_eq!(
        outcome.local_paths,
        vec!["com.github.autopkg.recipes/Firefox/Firefox.download.recipe"]
    );
    assert_eq!(std::fs::read_to_string(existing).unwrap(), "locally edited");
}

// ==================== Batch Tests ====================

/// Catalog that panics for one application and knows nothing else.
struct PanickyCatalog;

#[async_trait]
impl RecipeCatalog for PanickyCatalog {
    async fn search(&self, query: &str, _type_filter: Option<&str>) -> Vec<CandidateRecipe> {
        assert!(query != "Boom", "catalog exploded");
        Vec::new()
    }

    async fn fetch(&self, candidate: &CandidateRecipe) -> Result<String, CatalogError> {
        Err(CatalogError::invalid_locator(candidate.source_locator.clone()))
    }
}

#[tokio::test]
async fn test_batch_survives_panics_and_empty_names() {
    let output = TempDir::new().unwrap();
    let engine =
        RetrievalEngine::new(ResolutionConfig::default(), Arc::new(PanickyCatalog), output.path());
    let apps: Vec<String> =
        ["Alpha", "Boom", "  ", "Delta"].iter().map(ToString::to_string).collect();

    let outcomes = engine.process(&apps).await;

    assert_eq!(outcomes.len(), 4);
    let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            ResolutionStatus::NotFound,
            ResolutionStatus::Error,
            ResolutionStatus::Error,
            ResolutionStatus::NotFound,
        ]
    );
    assert!(outcomes[1].error_detail.as_deref().unwrap().contains("catalog exploded"));
    assert_eq!(engine.stats().total(), 4);
    assert_eq!(engine.stats().errors(), 2);

    let report = RunReport::from_outcomes(&outcomes);
    assert_eq!(report.not_found, 2);
    assert_eq!(report.errors, 2);
}

#[tokio::test]
async fn test_stop_flag_skips_remaining_applications() {
    let output = TempDir::new().unwrap();
    let engine =
        RetrievalEngine::new(ResolutionConfig::default(), Arc::new(PanickyCatalog), output.path());
    let stop = AtomicBool::new(false);
    let apps: Vec<String> = ["Alpha", "Beta", "Gamma"].iter().map(ToString::to_string).collect();

    let mut seen = 0;
    let outcomes = engine
        .process_observed(&apps, &stop, |_| {
            seen += 1;
            stop.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(seen, 1);
}
