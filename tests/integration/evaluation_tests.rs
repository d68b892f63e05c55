//! Integration tests for the evaluation stage
//!
//! A wiremock server plays an OpenAI-compatible chat-completions API.

use crate::common::{mount_page, page_with_links, site_config, started_ledger};
use serde_json::json;
use sitemeter::config::HeuristicConfig;
use sitemeter::crawler::{http_coordinator, CrawlOutput, CrawledPage};
use sitemeter::evaluation::{run_evaluations, ChatEvaluator, EvaluationSettings};
use sitemeter::metrics::{MetricsLedger, PricingTable};
use sitemeter::output::write_reports;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str, prompt_tokens: u64, completion_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    }))
}

fn evaluator(server: &MockServer) -> ChatEvaluator {
    ChatEvaluator::new(
        reqwest::Client::new(),
        &format!("{}/v1", server.uri()),
        "test-key",
        "gpt-4o-mini",
        500,
    )
}

fn crawl(urls: &[&str]) -> CrawlOutput {
    CrawlOutput {
        pages: urls
            .iter()
            .map(|url| CrawledPage {
                url: url.to_string(),
                depth: 0,
                title: None,
                text: format!("Content of {}", url),
                content_hash: "0".repeat(64),
            })
            .collect(),
        aborted: false,
    }
}

fn heuristic(name: &str) -> HeuristicConfig {
    HeuristicConfig {
        name: name.to_string(),
        prompt: format!("Evaluate {} for [Enter Website URL Here].", name),
    }
}

fn settings() -> EvaluationSettings {
    EvaluationSettings {
        site_url: "https://shop.example.com/".to_string(),
        site_placeholder: "[Enter Website URL Here]".to_string(),
        max_content_chars: 1000,
    }
}

fn ledger() -> MetricsLedger {
    let ledger = MetricsLedger::new("gpt-4o-mini", PricingTable::builtin(), 5).unwrap();
    ledger.start_session().unwrap();
    ledger
}

#[tokio::test]
async fn test_usage_tokens_recorded_per_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(completion(
            "Clear navigation.\n**Overall Numeric Score for Consistency: 3**",
            120,
            30,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let ledger = ledger();
    let report = run_evaluations(
        &evaluator(&server),
        &[heuristic("Consistency")],
        &crawl(&["https://shop.example.com/", "https://shop.example.com/cart"]),
        &ledger,
        &settings(),
    )
    .await
    .expect("evaluation");

    assert_eq!(report.evaluations.len(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(ledger.api_calls(), 2);
    assert_eq!(ledger.total_input_tokens(), 240);
    assert_eq!(ledger.total_output_tokens(), 60);

    let score = &report.scores[0];
    assert_eq!(score.average_score, Some(3.0));
    assert_eq!(score.pages_evaluated, 2);
    assert_eq!(score.grade, "B");
}

#[tokio::test]
async fn test_request_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Overall Numeric Score: 4", 10, 5))
        .mount(&server)
        .await;

    let ledger = ledger();
    run_evaluations(
        &evaluator(&server),
        &[heuristic("Feedback")],
        &crawl(&["https://shop.example.com/"]),
        &ledger,
        &settings(),
    )
    .await
    .expect("evaluation");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["max_tokens"], 500);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");

    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.starts_with("Evaluate Feedback for https://shop.example.com/."));
    assert!(user.contains("Page Content:\nContent of https://shop.example.com/"));
}

#[tokio::test]
async fn test_api_error_is_a_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let ledger = ledger();
    let report = run_evaluations(
        &evaluator(&server),
        &[heuristic("Consistency"), heuristic("Feedback")],
        &crawl(&["https://shop.example.com/"]),
        &ledger,
        &settings(),
    )
    .await
    .expect("evaluation");

    assert_eq!(report.failed(), 2);
    assert_eq!(ledger.api_calls(), 0);
    assert_eq!(ledger.total_tokens(), 0);
    assert!(report.evaluations[0]
        .error
        .as_deref()
        .unwrap()
        .contains("429"));
    assert_eq!(report.scores[0].grade, "N/A");
}

#[tokio::test]
async fn test_missing_usage_counts_call_without_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "No score here" } }]
        })))
        .mount(&server)
        .await;

    let ledger = ledger();
    let report = run_evaluations(
        &evaluator(&server),
        &[heuristic("Consistency")],
        &crawl(&["https://shop.example.com/"]),
        &ledger,
        &settings(),
    )
    .await
    .expect("evaluation");

    assert_eq!(report.failed(), 0);
    assert_eq!(report.evaluations[0].score, None);
    assert_eq!(ledger.api_calls(), 1);
    assert_eq!(ledger.total_tokens(), 0);
}

#[tokio::test]
async fn test_crawl_evaluate_report_pipeline() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", page_with_links("Home", &["/about"])).await;
    mount_page(&site, "/about", page_with_links("About", &[])).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Overall Numeric Score for Feedback: 2", 1000, 500))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let config = site_config(
        &dir,
        &format!("start-url = \"{}/\"\nmax-pages = 2", base),
        r#"
[evaluation]
model = "gpt-4o"

[[evaluation.heuristics]]
name = "Feedback"
prompt = "Rate feedback on [Enter Website URL Here]"
"#,
    );
    let ledger: Arc<MetricsLedger> = started_ledger(&config);

    let mut coordinator = http_coordinator(&config, ledger.clone()).expect("coordinator");
    let output = coordinator.run().await.expect("Crawl failed");

    let report = run_evaluations(
        &evaluator(&api),
        &config.evaluation.heuristics,
        &output,
        &ledger,
        &EvaluationSettings::from_config(&config).unwrap(),
    )
    .await
    .expect("evaluation");
    ledger.end_session().unwrap();

    let internal = write_reports(&config.output, &ledger, Some(&report), "hash").unwrap();

    // gpt-4o: 2 calls * (1.0 * 0.005 + 0.5 * 0.015)
    assert_eq!(internal.summary.api_calls, 2);
    assert_eq!(internal.summary.total_tokens, 3000);
    assert!((internal.summary.estimated_cost_usd - 0.025).abs() < 1e-9);
    assert!((internal.summary.cost_per_page - 0.0125).abs() < 1e-9);
    assert_eq!(internal.cost.tokens_per_page, 1500.0);

    let client = std::fs::read_to_string(&config.output.report_path).unwrap();
    assert!(client.contains("| Feedback | 2.00 | 2 | C |"));
    assert!(!client.contains(&base));

    let internal_md = std::fs::read_to_string(&config.output.internal_markdown_path).unwrap();
    assert!(internal_md.contains(&format!("### Feedback ({}/about)", base)));
}
