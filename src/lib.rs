//! Sitemeter: a bounded site crawler with a verifiable cost ledger
//!
//! This crate crawls a target website under strict page and depth limits,
//! optionally behind a login form, classifies every URL it meets (crawled or
//! skipped with a reason), hands crawled page text to an LLM evaluation step,
//! and accounts for time, tokens and cost in a single per-session ledger.

pub mod config;
pub mod crawler;
pub mod evaluation;
pub mod metrics;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Sitemeter operations
#[derive(Debug, Error)]
pub enum SitemeterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] crawler::AuthError),

    #[error("Login failed: {detail}")]
    LoginFailed { detail: String },

    #[error("Browser error: {0}")]
    Browser(#[from] crawler::BrowserError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] metrics::MetricsError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] evaluation::EvaluationError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing secret: environment variable {0} is not set")]
    MissingSecret(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sitemeter operations
pub type Result<T> = std::result::Result<T, SitemeterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlOutput, CrawledPage};
pub use metrics::{MetricsLedger, MetricsSummary, PricingTable, SkipReason};
pub use url::{host_key, normalize_url};
