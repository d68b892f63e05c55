//! Crawler module for bounded, optionally authenticated site traversal
//!
//! This module contains the core crawling logic, including:
//! - A browsing session abstraction with an HTTP implementation
//! - Form-based login before the crawl
//! - HTML parsing, link extraction and text cleaning
//! - Pre-fetch classification against the crawl bounds
//! - Overall crawl coordination

mod auth;
mod browser;
mod classifier;
mod coordinator;
mod frontier;
mod parser;


pub use auth::{
    AuthError, AuthNavigator, AuthOutcome, AuthState, Credentials, ERROR_PROBES,
    LOGIN_FAILED_NO_REDIRECT,
};
pub use browser::{
    build_http_client, click_within, goto_within, parse_selector, Browser, BrowserError,
    HttpBrowser,
};
pub use classifier::{Decision, SkipClassifier};
pub use coordinator::{
    http_coordinator, AbortHandle, Coordinator, CrawlOutput, CrawlSettings, CrawledPage,
};
pub use frontier::{Frontier, QueuedUrl};
pub use parser::{collapse_whitespace, content_hash, parse_html, ParsedPage};

/// Longest skip or failure detail kept in the ledger, in characters
pub const DETAIL_MAX_CHARS: usize = 50;

/// Keeps the first [`DETAIL_MAX_CHARS`] characters of a detail message
pub fn truncate_detail(detail: &str) -> String {
    detail.chars().take(DETAIL_MAX_CHARS).collect()
}
