//! Integration tests for the login flow
//!
//! The mock site serves a login form, accepts one username/password pair
//! and protects its pages behind a session cookie.

use crate::common::{html, mount_page, page_with_links, site_config, started_ledger};
use sitemeter::crawler::http_coordinator;
use sitemeter::metrics::SessionState;
use sitemeter::output::write_partial_reports;
use sitemeter::SitemeterError;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_FORM: &str = r#"<html><head><title>Sign in</title></head><body>
<form method="post" action="/login">
  <input id="user-name" name="username" type="text">
  <input id="password" name="password" type="password">
  <input type="hidden" name="csrf" value="token-1">
  <button id="login-button" type="submit" name="action" value="login">Sign in</button>
</form>
</body></html>"#;

const REJECTED_FORM: &str = r#"<html><head><title>Sign in</title></head><body>
<div class="error">Invalid username or password</div>
<form method="post" action="/login">
  <input id="user-name" name="username" type="text">
  <input id="password" name="password" type="password">
  <button id="login-button" type="submit">Sign in</button>
</form>
</body></html>"#;

fn auth_section(base: &str, password: &str) -> String {
    format!(
        r##"
[auth]
login-url = "{base}/login"
username = "alice"
password = "{password}"
username-selector = "#user-name"
password-selector = "#password"
submit-selector = "#login-button"
"##
    )
}

/// Mounts the login form plus a POST handler that accepts alice/secret
async fn mount_login(server: &MockServer) {
    mount_page(server, "/login", LOGIN_FORM.to_string()).await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=secret"))
        .and(body_string_contains("csrf=token-1"))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("location", "/dashboard")
                .insert_header("set-cookie", "session=abc123; Path=/"),
        )
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(html(REJECTED_FORM))
        .with_priority(2)
        .mount(server)
        .await;
}

/// Mounts a page only reachable with the session cookie
async fn mount_protected(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("cookie", "session=abc123"))
        .respond_with(html(&body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_crawl_with_session_cookie() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_login(&server).await;
    mount_protected(
        &server,
        "/dashboard",
        page_with_links("Dashboard", &["/reports"]),
    )
    .await;
    mount_protected(&server, "/reports", page_with_links("Reports", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(&dir, "max-pages = 5", &auth_section(&base, "secret"));
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![format!("{}/dashboard", base), format!("{}/reports", base)]
    );
    assert_eq!(output.pages[0].depth, 0);
    assert_eq!(output.pages[1].title.as_deref(), Some("Reports"));
    // The login page itself is not part of the crawl
    assert_eq!(ledger.pages_crawled(), 2);
    assert_eq!(ledger.pages_skipped(), 0);
}

#[tokio::test]
async fn test_rejected_login_is_fatal_without_prescriptive_urls() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(&dir, "max-pages = 5", &auth_section(&base, "wrong"));
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let result = coordinator.run().await;

    match result {
        Err(SitemeterError::LoginFailed { detail }) => {
            assert!(detail.contains("Invalid username or password"), "{}", detail)
        }
        other => panic!("expected LoginFailed, got {:?}", other.map(|o| o.len())),
    }
    assert_eq!(ledger.pages_crawled(), 0);
}

#[tokio::test]
async fn test_failed_session_still_writes_reports() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_login(&server).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(&dir, "max-pages = 5", &auth_section(&base, "wrong"));
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    assert!(coordinator.run().await.is_err());

    let internal = write_partial_reports(&config.output, &ledger, "hash").expect("reports");

    assert_eq!(ledger.state(), SessionState::Ended);
    assert_eq!(internal.summary.pages_crawled, 0);
    let client = std::fs::read_to_string(&config.output.report_path).unwrap();
    assert!(client.contains("- **Pages Crawled**: 0"));
}

#[tokio::test]
async fn test_rejected_login_falls_back_to_prescriptive_urls() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_login(&server).await;
    mount_page(
        &server,
        "/status",
        page_with_links("Status", &["/status/history"]),
    )
    .await;
    mount_page(&server, "/help", page_with_links("Help", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("max-pages = 5\nprescriptive-urls = [\"{base}/status\", \"{base}/help\"]"),
        &auth_section(&base, "wrong"),
    );
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![format!("{}/status", base), format!("{}/help", base)]
    );
    // Links are not followed in fallback mode
    assert_eq!(ledger.pages_skipped(), 0);
}

#[tokio::test]
async fn test_missing_login_form_counts_as_authenticated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/login", page_with_links("Welcome back", &["/home"])).await;
    mount_page(&server, "/home", page_with_links("Home", &[])).await;

    let dir = TempDir::new().unwrap();
    let config = site_config(&dir, "max-pages = 5", &auth_section(&base, "secret"));
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let urls: Vec<&str> = output.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![format!("{}/login", base), format!("{}/home", base)]
    );
}

#[tokio::test]
async fn test_unreachable_login_page_is_auth_error() {
    let server = MockServer::start().await;
    let base = server.uri();
    // Nothing mounted: /login answers 404

    let dir = TempDir::new().unwrap();
    let config = site_config(&dir, "max-pages = 5", &auth_section(&base, "secret"));
    let ledger = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let result = coordinator.run().await;

    assert!(matches!(result, Err(SitemeterError::Auth(_))));
}
