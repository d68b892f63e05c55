//! Shared helpers for the integration tests

use sitemeter::config::{load_config, Config};
use sitemeter::metrics::MetricsLedger;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An HTML response
pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

/// A page with a title and one anchor per link
pub fn page_with_links(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>\n{}</body></html>",
        title, title, anchors
    )
}

/// Mounts a GET route serving an HTML page
pub async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(&body))
        .mount(server)
        .await;
}

/// Writes a configuration file into `dir` and loads it
///
/// `crawl` holds the `[crawl]` keys besides timeouts; `extra` is appended
/// as further sections (`[auth]`, `[evaluation]`, ...).
pub fn site_config(dir: &TempDir, crawl: &str, extra: &str) -> Config {
    let out = |name: &str| dir.path().join(name).display().to_string();
    let report = out("report.md");
    let internal = out("internal.md");
    let database = out("internal.db");
    let summary = out("summary.json");

    let toml = format!(
        r#"
[crawl]
{crawl}
navigation-timeout-ms = 5000
politeness-delay-ms = 0

[user-agent]
crawler-name = "sitemeter-test"
crawler-version = "0.1"
contact-url = "https://example.com/bot"

{extra}

[output]
report-path = "{report}"
internal-markdown-path = "{internal}"
internal-database-path = "{database}"
summary-json-path = "{summary}"
"#
    );

    let config_path = dir.path().join("sitemeter.toml");
    std::fs::write(&config_path, toml).expect("Failed to write config");
    load_config(&config_path).expect("Failed to load config")
}

/// A started ledger sized for `config`
pub fn started_ledger(config: &Config) -> Arc<MetricsLedger> {
    let ledger = MetricsLedger::new(
        config.evaluation.model.clone(),
        config.pricing_table(),
        config.crawl.max_pages,
    )
    .expect("Failed to create ledger");
    ledger.start_session().expect("Failed to start session");
    Arc::new(ledger)
}
