//! Record types kept by the metrics ledger

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Why the orchestrator declined to fetch (or failed to fetch) a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The crawled-page count had already reached the configured maximum
    MaxLimitReached,

    /// The URL was already fetched (or attempted) in this session
    Duplicate,

    /// The URL sits deeper than the configured maximum depth
    MaxDepthExceeded,

    /// The URL's host differs from the session's base domain
    DomainMismatch,

    /// The fetch itself failed (timeout, connection error, HTTP error)
    NavigationError,
}

impl SkipReason {
    /// Stable snake_case identifier used in reports and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxLimitReached => "max_limit_reached",
            Self::Duplicate => "duplicate",
            Self::MaxDepthExceeded => "max_depth_exceeded",
            Self::DomainMismatch => "domain_mismatch",
            Self::NavigationError => "navigation_error",
        }
    }

    /// Returns every reason in classifier priority order
    pub fn all() -> [Self; 5] {
        [
            Self::MaxLimitReached,
            Self::Duplicate,
            Self::MaxDepthExceeded,
            Self::DomainMismatch,
            Self::NavigationError,
        ]
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
    /// Hex SHA-256 of the cleaned page text
    pub content_hash: String,
}

/// A URL the orchestrator did not crawl
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub url: String,
    pub reason: SkipReason,
    pub depth: u32,
    pub detail: Option<String>,
}
