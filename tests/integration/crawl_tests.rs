//! Integration tests for the crawler
//!
//! A wiremock server plays the target site; the crawl runs over a real
//! HTTP browsing session.

use crate::common::{mount_page, page_with_links, site_config, started_ledger};
use rusqlite::Connection;
use sitemeter::crawler::http_coordinator;
use sitemeter::metrics::SkipReason;
use sitemeter::output::{write_reports, UrlStatus};
use std::collections::HashSet;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        page_with_links("Home", &["/page1", "/page2", "http://elsewhere.test/"]),
    )
    .await;
    mount_page(&server, "/page1", page_with_links("Page 1", &["/"])).await;
    mount_page(&server, "/page2", page_with_links("Page 2", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base)
        ]
    );
    assert_eq!(output.pages[0].title.as_deref(), Some("Home"));
    assert!(output.pages[1].text.contains("Page 1"));
    assert!(!output.aborted);

    let skips = ledger.skip_reasons();
    assert_eq!(
        skips.get(&SkipReason::DomainMismatch),
        Some(&vec!["http://elsewhere.test/".to_string()])
    );
    // /page1 links back home
    assert_eq!(skips.get(&SkipReason::Duplicate).map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_max_pages_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        page_with_links(
            "Home",
            &["/about", "/products", "/products/item-1", "/contact"],
        ),
    )
    .await;
    mount_page(&server, "/about", page_with_links("About", &[])).await;
    mount_page(&server, "/products", page_with_links("Products", &[])).await;
    mount_page(&server, "/products/item-1", page_with_links("Item", &[])).await;
    mount_page(&server, "/contact", page_with_links("Contact", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 3", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    assert_eq!(output.len(), 3);
    assert_eq!(ledger.pages_crawled(), 3);
    assert_eq!(ledger.pages_skipped(), 2);
    assert_eq!(
        ledger.skip_reasons().get(&SkipReason::MaxLimitReached),
        Some(&vec![
            format!("{}/products/item-1", base),
            format!("{}/contact", base)
        ])
    );
}

#[tokio::test]
async fn test_depth_limit_respected() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", page_with_links("Root", &["/a"])).await;
    mount_page(&server, "/a", page_with_links("A", &["/b"])).await;
    mount_page(&server, "/b", page_with_links("B", &["/c"])).await;
    mount_page(&server, "/c", page_with_links("C", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10\nmax-depth = 2", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let depths: Vec<u32> = output.iter().map(|p| p.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);

    let skips = ledger.skip_records();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].url, format!("{}/c", base));
    assert_eq!(skips[0].reason, SkipReason::MaxDepthExceeded);
    assert_eq!(skips[0].depth, 3);
}

#[tokio::test]
async fn test_failed_fetches_are_navigation_errors() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        page_with_links("Home", &["/broken", "/missing", "/report.pdf"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_raw(b"<html><body>Oops</body></html>".to_vec(), "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;
    // /missing is left unmatched: wiremock answers 404

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    assert_eq!(output.len(), 1);

    let skips = ledger.skip_records();
    assert_eq!(skips.len(), 3);
    assert!(skips
        .iter()
        .all(|s| s.reason == SkipReason::NavigationError && s.detail.is_some()));
    assert!(skips[0].detail.as_deref().unwrap().contains("500"));
    assert!(skips[1].detail.as_deref().unwrap().contains("404"));
}

#[tokio::test]
async fn test_redirect_target_counts_as_visited() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", page_with_links("Home", &["/old", "/new"])).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", page_with_links("New", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    assert_eq!(output.len(), 2);
    assert_eq!(output.pages[1].url, format!("{}/old", base));
    assert_eq!(
        ledger.skip_reasons().get(&SkipReason::Duplicate),
        Some(&vec![format!("{}/new", base)])
    );
}

#[tokio::test]
async fn test_redirect_off_site_is_not_crawled() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", page_with_links("Home", &["/out"])).await;
    Mock::given(method("GET"))
        .and(path("/out"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/landing", other.uri()).as_str()),
        )
        .mount(&server)
        .await;
    mount_page(&other, "/landing", page_with_links("Other site", &["/x"])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec![format!("{}/", base)]);
    assert_eq!(ledger.pages_crawled(), 1);

    let skips = ledger.skip_records();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].url, format!("{}/out", base));
    assert_eq!(skips[0].reason, SkipReason::DomainMismatch);
    assert!(skips[0].detail.as_deref().unwrap().starts_with("redirected to"));
}

#[tokio::test]
async fn test_redirect_to_crawled_page_is_duplicate() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", page_with_links("Home", &["/new", "/old"])).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_page(&server, "/new", page_with_links("New", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec![format!("{}/", base), format!("{}/new", base)]);
    assert_eq!(
        ledger.skip_reasons().get(&SkipReason::Duplicate),
        Some(&vec![format!("{}/old", base)])
    );
}

#[tokio::test]
async fn test_prescriptive_urls_crawled_first() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", page_with_links("Home", &["/pricing"])).await;
    mount_page(&server, "/pricing", page_with_links("Pricing", &[])).await;
    mount_page(&server, "/docs", page_with_links("Docs", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!(
            "start-url = \"{base}/\"\nmax-pages = 10\nprescriptive-urls = [\"{base}/docs\", \"{base}/pricing\"]"
        ),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/docs", base),
            format!("{}/pricing", base),
            format!("{}/", base)
        ]
    );
    assert!(output.iter().all(|p| p.depth == 0));
    // Home links to /pricing, already crawled
    assert_eq!(ledger.pages_skipped(), 1);
}

#[tokio::test]
async fn test_abort_before_run_crawls_nothing() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", page_with_links("Home", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 10", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    coordinator.abort_handle().abort();
    let output = coordinator.run().await.expect("Crawl failed");

    assert!(output.aborted);
    assert!(output.is_empty());
    assert_eq!(ledger.pages_crawled(), 0);
}

#[tokio::test]
async fn test_reports_after_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        page_with_links("Home", &["/a", "/b", "/c", "/", "http://elsewhere.test/x"]),
    )
    .await;
    mount_page(&server, "/a", page_with_links("A", &["/b"])).await;
    mount_page(&server, "/b", page_with_links("B", &[])).await;
    mount_page(&server, "/c", page_with_links("C", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 2", base),
        "",
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    coordinator.run().await.expect("Crawl failed");
    ledger.end_session().unwrap();

    let internal = write_reports(&config.output, &ledger, None, "test-hash").expect("reports");

    // Every recorded URL appears exactly once in the audit
    let mut expected: HashSet<String> = HashSet::new();
    expected.extend(ledger.page_records().into_iter().map(|p| p.url));
    expected.extend(ledger.skip_records().into_iter().map(|s| s.url));
    let listed: Vec<String> = internal.urls.iter().map(|r| r.url.clone()).collect();
    let unique: HashSet<String> = listed.iter().cloned().collect();
    assert_eq!(listed.len(), unique.len());
    assert_eq!(unique, expected);
    assert_eq!(internal.rows(UrlStatus::Crawled).count(), 2);

    // The client report carries no URL at all
    let client = std::fs::read_to_string(&config.output.report_path).unwrap();
    assert!(!client.contains(&base));
    assert!(!client.contains("elsewhere.test"));
    assert!(!client.contains("http"));
    assert!(client.contains("- **Pages Crawled**: 2"));

    let internal_md = std::fs::read_to_string(&config.output.internal_markdown_path).unwrap();
    assert!(internal_md.contains(&format!("{}/c", base)));
    assert!(internal_md.contains("- **Config Hash**: test-hash"));

    let conn = Connection::open(&config.output.internal_database_path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM all_urls", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows as usize, expected.len());

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(config.output.summary_json_path.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(json["pages_crawled"], 2);
    assert_eq!(json["pages_requested"], 2);
}
