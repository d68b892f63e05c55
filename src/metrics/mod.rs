//! Metrics module: the per-session ledger of crawl outcomes, tokens and cost
//!
//! # Components
//!
//! - `MetricsLedger`: owns every crawl/skip record, the token counters and the
//!   session clock; produces `MetricsSummary` snapshots
//! - `PricingTable`: model id to per-thousand-token prices
//! - `PageRecord` / `SkipRecord` / `SkipReason`: the immutable records kept
//!   for the session

mod ledger;
mod pricing;
mod records;

pub use ledger::{format_duration, round_to, MetricsLedger, MetricsSummary, SessionState};
pub use pricing::{ModelPricing, PricingTable, DEFAULT_MODEL};
pub use records::{PageRecord, SkipReason, SkipRecord};

use thiserror::Error;

/// Errors raised by the metrics ledger
#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("Session has not been started")]
    NotStarted,

    #[error("Session has already been started")]
    AlreadyStarted,

    #[error("Session has already ended; the ledger is read-only")]
    AlreadyEnded,

    #[error("End time {end} is earlier than start time {start}")]
    InvalidTimeRange { start: String, end: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

/// Result type alias for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
