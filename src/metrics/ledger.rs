//! The per-session metrics ledger
//!
//! A `MetricsLedger` is created once per session and passed explicitly (behind
//! an `Arc`) to every component that records into it: the crawl coordinator
//! records page outcomes, the evaluation stage records API calls. Token
//! counters are atomics; page/skip records and the session clock sit behind a
//! mutex, so recording is safe from any task or thread.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted --start_session--> Active --end_session--> Ended (read-only)
//! ```

use crate::metrics::pricing::{ModelPricing, PricingTable};
use crate::metrics::records::{PageRecord, SkipReason, SkipRecord};
use crate::metrics::{MetricsError, MetricsResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Active,
    Ended,
}

#[derive(Debug, Default)]
struct TimeMetrics {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl TimeMetrics {
    fn state(&self) -> SessionState {
        match (self.start_time, self.end_time) {
            (None, _) => SessionState::NotStarted,
            (Some(_), None) => SessionState::Active,
            (Some(_), Some(_)) => SessionState::Ended,
        }
    }

    fn ensure_active(&self) -> MetricsResult<()> {
        match self.state() {
            SessionState::NotStarted => Err(MetricsError::NotStarted),
            SessionState::Active => Ok(()),
            SessionState::Ended => Err(MetricsError::AlreadyEnded),
        }
    }

    /// Elapsed seconds, or 0.0 until both ends are set
    fn elapsed_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct CrawlRecords {
    pages: Vec<PageRecord>,
    skips: Vec<SkipRecord>,
}

/// Immutable snapshot of a ledger
///
/// The field set is fixed; every field is present even for a session that
/// crawled nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Elapsed wall-clock time as `HH:MM:SS`
    pub elapsed_time: String,
    pub elapsed_seconds: f64,
    pub pages_requested: u32,
    pub pages_crawled: u64,
    pub pages_skipped: u64,
    /// Skip reason to URLs, each list in discovery order
    pub skip_reasons: BTreeMap<SkipReason, Vec<String>>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub api_calls: u64,
    /// Rounded to 4 decimal places
    pub estimated_cost_usd: f64,
    /// Rounded to 4 decimal places
    pub cost_per_page: f64,
    pub model_used: String,
}

/// Central metrics tracking for one crawl/evaluation session
#[derive(Debug)]
pub struct MetricsLedger {
    model: String,
    model_pricing: ModelPricing,
    pricing: PricingTable,
    pages_requested: u32,
    time: Mutex<TimeMetrics>,
    records: Mutex<CrawlRecords>,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
    api_calls: AtomicU64,
}

impl MetricsLedger {
    /// Creates a ledger for one session
    ///
    /// # Arguments
    ///
    /// * `model` - The model whose prices the summary uses
    /// * `pricing` - The pricing table; must contain `model`
    /// * `pages_requested` - The configured page limit, copied once
    ///
    /// # Returns
    ///
    /// * `Ok(MetricsLedger)` - A ledger in the `NotStarted` state
    /// * `Err(MetricsError::UnknownModel)` - `model` is not in `pricing`
    pub fn new(
        model: impl Into<String>,
        pricing: PricingTable,
        pages_requested: u32,
    ) -> MetricsResult<Self> {
        let model = model.into();
        let model_pricing = pricing
            .get(&model)
            .cloned()
            .ok_or_else(|| MetricsError::UnknownModel(model.clone()))?;

        Ok(Self {
            model,
            model_pricing,
            pricing,
            pages_requested,
            time: Mutex::new(TimeMetrics::default()),
            records: Mutex::new(CrawlRecords::default()),
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
            api_calls: AtomicU64::new(0),
        })
    }

    // ===== Lifecycle =====

    /// Marks the session start with the current wall-clock time
    pub fn start_session(&self) -> MetricsResult<()> {
        self.start_session_at(Utc::now())
    }

    /// Marks the session start at an explicit instant
    pub fn start_session_at(&self, at: DateTime<Utc>) -> MetricsResult<()> {
        let mut time = self.time.lock();
        if time.start_time.is_some() {
            return Err(MetricsError::AlreadyStarted);
        }
        time.start_time = Some(at);
        tracing::debug!("Metrics session started at {}", at.to_rfc3339());
        Ok(())
    }

    /// Marks the session end with the current wall-clock time
    ///
    /// A wall clock that stepped backwards is clamped to the start time.
    pub fn end_session(&self) -> MetricsResult<()> {
        let now = Utc::now();
        let start = self.time.lock().start_time;
        let at = match start {
            Some(start) if now < start => start,
            _ => now,
        };
        self.end_session_at(at)
    }

    /// Marks the session end at an explicit instant
    pub fn end_session_at(&self, at: DateTime<Utc>) -> MetricsResult<()> {
        let mut time = self.time.lock();
        let start = time.start_time.ok_or(MetricsError::NotStarted)?;
        if time.end_time.is_some() {
            return Err(MetricsError::AlreadyEnded);
        }
        if at < start {
            return Err(MetricsError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: at.to_rfc3339(),
            });
        }
        time.end_time = Some(at);
        tracing::debug!("Metrics session ended at {}", at.to_rfc3339());
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.time.lock().state()
    }

    // ===== Recording =====

    /// Records a successfully fetched page
    pub fn record_page_crawled(
        &self,
        url: impl Into<String>,
        depth: u32,
        content_hash: impl Into<String>,
    ) -> MetricsResult<()> {
        let time = self.time.lock();
        time.ensure_active()?;

        self.records.lock().pages.push(PageRecord {
            url: url.into(),
            depth,
            fetched_at: Utc::now(),
            content_hash: content_hash.into(),
        });
        Ok(())
    }

    /// Records a URL that was not crawled, under its reason
    pub fn record_page_skipped(
        &self,
        url: impl Into<String>,
        reason: SkipReason,
        depth: u32,
        detail: Option<String>,
    ) -> MetricsResult<()> {
        let time = self.time.lock();
        time.ensure_active()?;

        self.records.lock().skips.push(SkipRecord {
            url: url.into(),
            reason,
            depth,
            detail,
        });
        Ok(())
    }

    /// Records token usage of one API call
    ///
    /// Adds both token counts and increments the call counter by exactly one.
    pub fn record_api_call(&self, input_tokens: u64, output_tokens: u64) -> MetricsResult<()> {
        // Holding the clock lock keeps end_session from racing an increment.
        let time = self.time.lock();
        time.ensure_active()?;

        self.total_input_tokens
            .fetch_add(input_tokens, Ordering::SeqCst);
        self.total_output_tokens
            .fetch_add(output_tokens, Ordering::SeqCst);
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // ===== Reading =====

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Prices of the session's model
    pub fn model_pricing(&self) -> &ModelPricing {
        &self.model_pricing
    }

    pub fn pages_requested(&self) -> u32 {
        self.pages_requested
    }

    pub fn pages_crawled(&self) -> u64 {
        self.records.lock().pages.len() as u64
    }

    pub fn pages_skipped(&self) -> u64 {
        self.records.lock().skips.len() as u64
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.total_input_tokens.load(Ordering::SeqCst)
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.total_output_tokens.load(Ordering::SeqCst)
    }

    /// Input plus output tokens; derived, never stored
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens() + self.total_output_tokens()
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::SeqCst)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.time.lock().start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.time.lock().end_time
    }

    /// Elapsed seconds between start and end, 0.0 until the session ended
    pub fn elapsed_seconds(&self) -> f64 {
        self.time.lock().elapsed_seconds()
    }

    /// Elapsed time as `HH:MM:SS`
    pub fn format_elapsed(&self) -> String {
        format_duration(self.elapsed_seconds())
    }

    /// Copies of every page record, in crawl order
    pub fn page_records(&self) -> Vec<PageRecord> {
        self.records.lock().pages.clone()
    }

    /// Copies of every skip record, in discovery order
    pub fn skip_records(&self) -> Vec<SkipRecord> {
        self.records.lock().skips.clone()
    }

    /// Skip reason to URLs, preserving discovery order within each reason
    pub fn skip_reasons(&self) -> BTreeMap<SkipReason, Vec<String>> {
        group_by_reason(&self.records.lock().skips)
    }

    /// Cost in USD of the tokens recorded so far, at `model`'s prices
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - `(input/1000)*input_price + (output/1000)*output_price`
    /// * `Err(MetricsError::UnknownModel)` - `model` is not in the pricing table
    pub fn calculate_cost(&self, model: &str) -> MetricsResult<f64> {
        let pricing = self
            .pricing
            .get(model)
            .ok_or_else(|| MetricsError::UnknownModel(model.to_string()))?;
        Ok(pricing.cost(self.total_input_tokens(), self.total_output_tokens()))
    }

    /// Returns the full summary snapshot
    ///
    /// `cost_per_page` divides by `max(pages_crawled, 1)`: a session that
    /// crawled nothing reports its whole cost as the per-page cost.
    pub fn summary(&self) -> MetricsSummary {
        let time = self.time.lock();
        let records = self.records.lock();

        let skip_reasons = group_by_reason(&records.skips);

        let input = self.total_input_tokens();
        let output = self.total_output_tokens();
        let cost = self.model_pricing.cost(input, output);
        let pages_crawled = records.pages.len() as u64;
        let elapsed_seconds = time.elapsed_seconds();

        MetricsSummary {
            elapsed_time: format_duration(elapsed_seconds),
            elapsed_seconds,
            pages_requested: self.pages_requested,
            pages_crawled,
            pages_skipped: records.skips.len() as u64,
            skip_reasons,
            total_input_tokens: input,
            total_output_tokens: output,
            total_tokens: input + output,
            api_calls: self.api_calls(),
            estimated_cost_usd: round_to(cost, 4),
            cost_per_page: round_to(cost / pages_crawled.max(1) as f64, 4),
            model_used: self.model.clone(),
        }
    }
}

fn group_by_reason(skips: &[SkipRecord]) -> BTreeMap<SkipReason, Vec<String>> {
    let mut reasons: BTreeMap<SkipReason, Vec<String>> = BTreeMap::new();
    for skip in skips {
        reasons.entry(skip.reason).or_default().push(skip.url.clone());
    }
    reasons
}

/// Formats whole seconds as `HH:MM:SS`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Rounds to the given number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
