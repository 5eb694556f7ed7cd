//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing and article pages and drive the
//! full crawl cycle end-to-end through the HTTP page driver.

use folio_harvest::config::{
    load_config_with_hash, Config, CrawlerConfig, FieldAttribute, FieldConfig, OutputConfig,
    PaginationConfig, SourceConfig, UserAgentConfig,
};
use folio_harvest::crawler::{CrawlOptions, Coordinator};
use folio_harvest::storage::{content_hash, Storage};
use folio_harvest::StopReason;
use std::collections::BTreeMap;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &TempDir, source: SourceConfig) -> Config {
    Config {
        crawler: CrawlerConfig {
            navigation_timeout_ms: 100,
            container_timeout_ms: 100,
            page_load_timeout_ms: 5000,
            retry_cooldown_ms: 0,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: Some("https://example.com/contact".to_string()),
        },
        output: OutputConfig {
            database_path: dir.path().join("harvest.db").display().to_string(),
            content_dir: dir.path().join("content").display().to_string(),
        },
        sources: vec![source],
    }
}

fn create_test_source(base_url: &str) -> SourceConfig {
    let mut listing_fields = BTreeMap::new();
    listing_fields.insert("title".to_string(), FieldConfig::text("h2"));
    listing_fields.insert(
        "url".to_string(),
        FieldConfig::text("a.story").with_attribute(FieldAttribute::Href),
    );
    listing_fields.insert("excerpt".to_string(), FieldConfig::text("p").optional());

    let mut detail_fields = BTreeMap::new();
    detail_fields.insert(
        "content".to_string(),
        FieldConfig::text("div.body").excluding(".ad"),
    );
    detail_fields.insert("author".to_string(), FieldConfig::text(".byline").optional());
    detail_fields.insert(
        "published_date".to_string(),
        FieldConfig::text("time").optional(),
    );

    SourceConfig {
        id: "gazette".to_string(),
        name: "The Gazette".to_string(),
        listing_url: format!("{}/news", base_url),
        container_selector: "article.item".to_string(),
        listing_fields,
        pagination: Some(PaginationConfig {
            next_button_selector: "a.next".to_string(),
            delay_seconds: 0.0,
        }),
        detail_container_selector: Some("main".to_string()),
        detail_fields,
    }
}

fn listing_item(id: u32) -> String {
    format!(
        r#"<article class="item"><h2>Story {id}</h2><a class="story" href="/story/{id}">Read</a><p>Teaser {id}</p></article>"#
    )
}

fn story_page(id: u32, author: Option<&str>) -> String {
    let byline = author
        .map(|a| format!(r#"<span class="byline">{}</span>"#, a))
        .unwrap_or_default();
    format!(
        r#"<html><body><main>
             <time>July {id}, 2025</time>{byline}
             <div class="body">Full text {id}<aside class="ad">Buy now</aside></div>
           </main></body></html>"#
    )
}

/// Mounts a two-page listing (stories 1, 2 then 3) and the three story pages
async fn mount_site(server: &MockServer, detail_expectation: Option<u64>) {
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>{}{}<a class="next" href="/news/2">Older</a></body></html>"#,
            listing_item(1),
            listing_item(2)
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/news/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<html><body>{}</body></html>",
            listing_item(3)
        )))
        .mount(server)
        .await;

    for (id, author) in [(1, Some("Ada")), (2, None), (3, Some("Grace"))] {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/story/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(story_page(id, author)));
        let mock = match detail_expectation {
            Some(times) => mock.expect(times),
            None => mock,
        };
        mock.mount(server).await;
    }
}

#[tokio::test]
async fn test_two_page_crawl() {
    let server = MockServer::start().await;
    mount_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, create_test_source(&server.uri()));
    let mut coordinator = Coordinator::from_config(&config, None).unwrap();

    let result = coordinator
        .run(&config.sources[0], CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap();
    let summary = result.summary;

    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.stopped_reason, Some(StopReason::NoNextButton));
    assert_eq!(summary.items_found, 3);
    assert_eq!(summary.items_processed, 3);
    assert_eq!(
        summary.items_found,
        summary.items_processed + summary.duplicates_skipped + summary.total_filtered_items
    );
    assert!(summary.listing_errors.is_empty());
    assert!(summary.content_errors.is_empty());

    let stored = coordinator
        .content_store()
        .retrieve(&format!("{}/story/1", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Story 1");
    assert_eq!(stored.content, "Full text 1");
    assert_eq!(stored.author.as_deref(), Some("Ada"));
    assert_eq!(
        stored.published_date.as_deref(),
        Some("2025-07-01T00:00:00.000Z")
    );

    let storage = coordinator.storage();
    assert_eq!(storage.count_content().unwrap(), 3);
    let links = storage.get_session_content(summary.session_id).unwrap();
    assert_eq!(links.len(), 3);
    assert!(links.windows(2).all(|w| w[0].processed_order < w[1].processed_order));
    assert!(!storage.is_session_active(summary.session_id).unwrap());
}

#[tokio::test]
async fn test_second_pass_skips_existing_without_detail_fetches() {
    let server = MockServer::start().await;
    // Each story page may be fetched exactly once across both runs.
    mount_site(&server, Some(1)).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, create_test_source(&server.uri()));
    let mut coordinator = Coordinator::from_config(&config, None).unwrap();
    let source = &config.sources[0];

    let first = coordinator
        .run(source, CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap()
        .summary;
    assert_eq!(first.items_processed, 3);

    let second = coordinator
        .run(source, CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap()
        .summary;

    assert_ne!(second.session_id, first.session_id);
    assert_eq!(second.items_processed, 0);
    assert_eq!(second.duplicates_skipped, 2);
    assert_eq!(second.stopped_reason, Some(StopReason::AllDuplicates));
    assert_eq!(
        second.items_found,
        second.items_processed + second.duplicates_skipped + second.total_filtered_items
    );

    server.verify().await;
}

#[tokio::test]
async fn test_missing_optional_author_is_recorded() {
    let server = MockServer::start().await;
    mount_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, create_test_source(&server.uri()));
    let mut coordinator = Coordinator::from_config(&config, None).unwrap();

    let summary = coordinator
        .run(&config.sources[0], CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap()
        .summary;

    // Story 2 is the second item of the run.
    let author = &summary.content_field_stats["author"];
    assert!(author.is_optional);
    assert_eq!(author.total_attempts, 3);
    assert_eq!(author.success_count, 2);
    assert_eq!(author.missing_items, vec![1]);
    assert_eq!(summary.content_warnings.len(), 1);

    let record = coordinator
        .storage()
        .get_by_hash(&content_hash(&format!("{}/story/2", server.uri())))
        .unwrap()
        .unwrap();
    assert_eq!(record.title, "Story 2");
    assert_eq!(record.author, None);
}

#[tokio::test]
async fn test_failed_detail_page_falls_back_to_listing_excerpt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>{}</body></html>", listing_item(7))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/story/7"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, create_test_source(&server.uri()));
    let mut coordinator = Coordinator::from_config(&config, None).unwrap();

    let summary = coordinator
        .run(&config.sources[0], CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap()
        .summary;

    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.items_processed, 1);
    assert_eq!(summary.items_with_errors, 1);
    assert!(summary.content_errors.is_empty());
    assert!(summary.content_warnings[0].contains("failed"));

    let links = coordinator
        .storage()
        .get_session_content(summary.session_id)
        .unwrap();
    assert!(links[0].had_content_extraction_error);

    let stored = coordinator
        .content_store()
        .retrieve(&format!("{}/story/7", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, "Teaser 7");
}

#[tokio::test]
async fn test_crawl_from_config_file_records_hash() {
    let server = MockServer::start().await;
    mount_site(&server, None).await;

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("harvest.toml");
    let toml = format!(
        r#"
[crawler]
content-concurrency = 2
max-pages = 1
navigation-timeout-ms = 100
container-timeout-ms = 100
retry-cooldown-ms = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"

[output]
database-path = "{db}"
content-dir = "{content}"

[[source]]
id = "gazette"
name = "The Gazette"
listing-url = "{base}/news"
container-selector = "article.item"
detail-container-selector = "main"

[source.listing-fields]
title = {{ selector = "h2" }}
url = {{ selector = "a.story", attribute = "href" }}

[source.pagination]
next-button-selector = "a.next"

[source.detail-fields]
content = {{ selector = "div.body", exclude-selectors = [".ad"] }}
"#,
        db = dir.path().join("harvest.db").display(),
        content = dir.path().join("content").display(),
        base = server.uri()
    );
    std::fs::write(&config_path, toml).unwrap();

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    let mut coordinator = Coordinator::from_config(&config, Some(hash.clone())).unwrap();

    let summary = coordinator
        .run(&config.sources[0], CrawlOptions::from_config(&config.crawler))
        .await
        .unwrap()
        .summary;

    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.stopped_reason, Some(StopReason::MaxPagesReached));

    let session = coordinator
        .storage()
        .get_session(summary.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.metadata.config_hash.as_deref(), Some(hash.as_str()));

    coordinator.into_storage().close().unwrap();
}
