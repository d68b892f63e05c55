//! Client and internal report projections
//!
//! Both reports are built from a single ledger snapshot so their numbers
//! always agree. The client report carries aggregate figures only and never
//! a URL; the internal report adds the URL-level audit trail and the cost
//! breakdown.

use crate::metrics::{round_to, MetricsLedger, MetricsSummary, SkipReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Client-facing metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientReport {
    pub elapsed_time: String,
    pub pages_requested: u32,
    pub pages_crawled: u64,
    pub pages_skipped: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub api_calls: u64,
    pub estimated_cost_usd: f64,
    pub cost_per_page: f64,
    pub model_used: String,
}

impl ClientReport {
    /// Projects a summary onto the client field set, dropping every URL
    pub fn from_summary(summary: &MetricsSummary) -> Self {
        Self {
            elapsed_time: summary.elapsed_time.clone(),
            pages_requested: summary.pages_requested,
            pages_crawled: summary.pages_crawled,
            pages_skipped: summary.pages_skipped,
            total_input_tokens: summary.total_input_tokens,
            total_output_tokens: summary.total_output_tokens,
            total_tokens: summary.total_tokens,
            api_calls: summary.api_calls,
            estimated_cost_usd: summary.estimated_cost_usd,
            cost_per_page: summary.cost_per_page,
            model_used: summary.model_used.clone(),
        }
    }
}

/// Whether a URL was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UrlStatus {
    Crawled,
    Skipped,
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crawled => f.write_str("Crawled"),
            Self::Skipped => f.write_str("Skipped"),
        }
    }
}

/// One row of the all-URLs audit section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRow {
    pub url: String,
    pub status: UrlStatus,
    pub reason: Option<SkipReason>,
    pub depth: u32,
    pub detail: Option<String>,
}

/// How the session's cost breaks down
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub model: String,
    pub input_price_per_thousand: f64,
    pub output_price_per_thousand: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub api_calls: u64,
    /// `total_tokens / max(pages_crawled, 1)`, rounded to 2 decimals
    pub tokens_per_page: f64,
    pub cost_per_page: f64,
    pub total_cost: f64,
}

/// Internal URL-level audit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalReport {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the configuration file, when known
    pub config_hash: Option<String>,
    pub summary: MetricsSummary,
    /// Deepest depth among `max_depth_exceeded` skips
    pub max_depth_observed: Option<u32>,
    pub urls: Vec<UrlRow>,
    pub cost: CostBreakdown,
}

impl InternalReport {
    /// Builds the internal report from the ledger's current state
    ///
    /// Every URL in a page or skip record appears exactly once in `urls`:
    /// crawled pages first in crawl order, then skipped URLs in discovery
    /// order. A URL recorded more than once keeps its first row, and a
    /// crawled row always wins over a skip of the same URL.
    pub fn assemble(ledger: &MetricsLedger) -> Self {
        let summary = ledger.summary();
        let pages = ledger.page_records();
        let skips = ledger.skip_records();

        let max_depth_observed = skips
            .iter()
            .filter(|skip| skip.reason == SkipReason::MaxDepthExceeded)
            .map(|skip| skip.depth)
            .max();

        let mut seen: HashSet<String> = HashSet::new();
        let mut urls = Vec::with_capacity(pages.len() + skips.len());

        for page in pages {
            if seen.insert(page.url.clone()) {
                urls.push(UrlRow {
                    url: page.url,
                    status: UrlStatus::Crawled,
                    reason: None,
                    depth: page.depth,
                    detail: None,
                });
            }
        }

        for skip in skips {
            if seen.insert(skip.url.clone()) {
                urls.push(UrlRow {
                    url: skip.url,
                    status: UrlStatus::Skipped,
                    reason: Some(skip.reason),
                    depth: skip.depth,
                    detail: skip.detail,
                });
            }
        }

        let pricing = ledger.model_pricing();
        let cost = CostBreakdown {
            model: summary.model_used.clone(),
            input_price_per_thousand: pricing.input_price_per_thousand,
            output_price_per_thousand: pricing.output_price_per_thousand,
            total_input_tokens: summary.total_input_tokens,
            total_output_tokens: summary.total_output_tokens,
            total_tokens: summary.total_tokens,
            api_calls: summary.api_calls,
            tokens_per_page: round_to(
                summary.total_tokens as f64 / summary.pages_crawled.max(1) as f64,
                2,
            ),
            cost_per_page: summary.cost_per_page,
            total_cost: summary.estimated_cost_usd,
        };

        Self {
            generated_at: Utc::now(),
            config_hash: None,
            summary,
            max_depth_observed,
            urls,
            cost,
        }
    }

    /// Attaches the configuration hash
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Rows with the given status
    pub fn rows(&self, status: UrlStatus) -> impl Iterator<Item = &UrlRow> {
        self.urls.iter().filter(move |row| row.status == status)
    }
}
