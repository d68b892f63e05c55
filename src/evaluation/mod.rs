//! LLM evaluation of crawled pages
//!
//! Each crawled page is evaluated once per configured heuristic. Token usage
//! of every successful call is recorded in the session's metrics ledger; a
//! failed call is logged, kept as a failed result and costs nothing.

mod chat;
mod score;

pub use chat::ChatEvaluator;
pub use score::{aggregate, letter_grade, parse_overall_score, HeuristicScore};

use crate::config::{Config, HeuristicConfig};
use crate::crawler::CrawlOutput;
use crate::metrics::MetricsLedger;
use crate::{ConfigError, SitemeterError};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by an evaluation call
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Text and token usage of one completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Something that can evaluate page content against a prompt
#[allow(async_fn_in_trait)]
pub trait Evaluator {
    async fn evaluate(&self, prompt: &str, content: &str) -> Result<Completion, EvaluationError>;
}

/// Inputs shared by every evaluation in a session
#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    /// Substituted for `site_placeholder` in each prompt
    pub site_url: String,
    pub site_placeholder: String,
    /// Page text beyond this many characters is not sent
    pub max_content_chars: usize,
}

impl EvaluationSettings {
    /// Resolves settings from a validated configuration
    ///
    /// The site URL substituted into prompts is the crawl's start URL.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            site_url: config.start_url()?.to_string(),
            site_placeholder: config.evaluation.site_placeholder.clone(),
            max_content_chars: config.evaluation.max_content_chars,
        })
    }
}

/// Result of evaluating one page against one heuristic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEvaluation {
    pub heuristic: String,
    pub url: String,
    /// Model output, or `None` when the call failed
    pub output: Option<String>,
    pub score: Option<f64>,
    pub error: Option<String>,
}

/// All evaluations of a session plus per-heuristic scores
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub evaluations: Vec<PageEvaluation>,
    pub scores: Vec<HeuristicScore>,
}

impl EvaluationReport {
    pub fn failed(&self) -> usize {
        self.evaluations.iter().filter(|e| e.error.is_some()).count()
    }
}

/// Evaluates every crawled page against every heuristic
///
/// Pages are processed in crawl order; for each page the heuristics run in
/// configured order.
///
/// # Returns
///
/// * `Ok(EvaluationReport)` - All results, including failed calls
/// * `Err(SitemeterError::Metrics)` - The ledger no longer accepts records
pub async fn run_evaluations<E: Evaluator>(
    evaluator: &E,
    heuristics: &[HeuristicConfig],
    crawl: &CrawlOutput,
    ledger: &MetricsLedger,
    settings: &EvaluationSettings,
) -> Result<EvaluationReport, SitemeterError> {
    let mut evaluations = Vec::new();
    let total = crawl.len() * heuristics.len();

    for page in crawl.iter() {
        let content = truncate_chars(&page.text, settings.max_content_chars);

        for heuristic in heuristics {
            tracing::info!(
                "[{}/{}] evaluating {} for {}",
                evaluations.len() + 1,
                total,
                heuristic.name,
                page.url
            );

            let prompt = heuristic
                .prompt
                .replace(&settings.site_placeholder, &settings.site_url);

            let evaluation = match evaluator.evaluate(&prompt, content).await {
                Ok(completion) => {
                    ledger.record_api_call(completion.input_tokens, completion.output_tokens)?;
                    let score = parse_overall_score(&completion.text);
                    if score.is_none() {
                        tracing::debug!("No overall score in output for {}", page.url);
                    }
                    PageEvaluation {
                        heuristic: heuristic.name.clone(),
                        url: page.url.clone(),
                        output: Some(completion.text),
                        score,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Evaluation of {} for {} failed: {}",
                        heuristic.name,
                        page.url,
                        e
                    );
                    PageEvaluation {
                        heuristic: heuristic.name.clone(),
                        url: page.url.clone(),
                        output: None,
                        score: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            evaluations.push(evaluation);
        }
    }

    let scores = heuristics
        .iter()
        .map(|heuristic| {
            let page_scores: Vec<f64> = evaluations
                .iter()
                .filter(|e| e.heuristic == heuristic.name)
                .filter_map(|e| e.score)
                .collect();
            aggregate(&heuristic.name, &page_scores)
        })
        .collect();

    Ok(EvaluationReport {
        evaluations,
        scores,
    })
}

/// Borrows at most `max` characters from the start of `text`
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
