//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Logging in once before the crawl when configured
//! - Seeding the frontier with prescriptive URLs and the start URL
//! - Classifying each candidate against the crawl bounds
//! - Fetching, cleaning and recording pages in the metrics ledger
//! - Handling interrupts

use crate::config::Config;
use crate::crawler::auth::{AuthNavigator, AuthOutcome, Credentials};
use crate::crawler::browser::{goto_within, Browser, HttpBrowser};
use crate::crawler::classifier::{Decision, SkipClassifier};
use crate::crawler::frontier::{Frontier, QueuedUrl};
use crate::crawler::parser::{content_hash, parse_html};
use crate::crawler::truncate_detail;
use crate::metrics::{MetricsLedger, SkipReason};
use crate::url::{is_same_site, normalize_url};
use crate::{ConfigError, SitemeterError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Resolved crawl bounds for one session
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub start_url: Url,
    /// Host key the crawl is confined to
    pub base_domain: String,
    pub max_pages: u32,
    pub max_depth: u32,
    /// Crawled first, in order, at depth 0
    pub prescriptive_urls: Vec<Url>,
    pub navigation_timeout: Duration,
    pub politeness_delay: Duration,
}

impl CrawlSettings {
    /// Resolves settings from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            start_url: config.start_url()?,
            base_domain: config.base_domain()?,
            max_pages: config.crawl.max_pages,
            max_depth: config.crawl.max_depth,
            prescriptive_urls: config.prescriptive_urls()?,
            navigation_timeout: config.navigation_timeout(),
            politeness_delay: config.politeness_delay(),
        })
    }
}

/// Cooperative cancellation flag shared with the crawl loop
///
/// Checked before each frontier pop; a fetch already in flight completes.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A successfully crawled page handed to the evaluation stage
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub url: String,
    pub depth: u32,
    pub title: Option<String>,
    /// Visible text with scripts and styles removed
    pub text: String,
    /// Hex SHA-256 of `text`
    pub content_hash: String,
}

/// Ordered result of a crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlOutput {
    pub pages: Vec<CrawledPage>,
    /// True if the crawl stopped early on request
    pub aborted: bool,
}

impl CrawlOutput {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrawledPage> {
        self.pages.iter()
    }
}

/// Main crawler coordinator structure
///
/// Owns the browsing session for the duration of the crawl and records every
/// outcome into the shared ledger. The ledger session must already be
/// active.
pub struct Coordinator<B: Browser> {
    settings: CrawlSettings,
    browser: B,
    ledger: Arc<MetricsLedger>,
    classifier: SkipClassifier,
    auth: Option<AuthNavigator>,
    abort: AbortHandle,
}

impl<B: Browser> Coordinator<B> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `settings` - Resolved crawl bounds
    /// * `browser` - The browsing session used for every fetch
    /// * `ledger` - The session's metrics ledger
    pub fn new(settings: CrawlSettings, browser: B, ledger: Arc<MetricsLedger>) -> Self {
        let classifier =
            SkipClassifier::new(settings.max_pages, settings.max_depth, &settings.base_domain);

        Self {
            settings,
            browser,
            ledger,
            classifier,
            auth: None,
            abort: AbortHandle::new(),
        }
    }

    /// Logs in with `navigator` before crawling
    pub fn with_auth(mut self, navigator: AuthNavigator) -> Self {
        self.auth = Some(navigator);
        self
    }

    /// Returns a handle that stops the crawl before the next candidate
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutput)` - Crawled pages in fetch order
    /// * `Err(SitemeterError)` - Login failed with no prescriptive URLs to
    ///   fall back on, or the ledger rejected a record
    pub async fn run(&mut self) -> Result<CrawlOutput, SitemeterError> {
        let mut start_url = Some(self.settings.start_url.clone());

        if let Some(mut navigator) = self.auth.take() {
            let result = self.authenticate(&mut navigator).await;
            self.auth = Some(navigator);

            match result {
                Ok(landing) => start_url = Some(landing),
                Err(e) if self.settings.prescriptive_urls.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "{}; crawling {} prescriptive URLs without following links",
                        e,
                        self.settings.prescriptive_urls.len()
                    );
                    start_url = None;
                }
            }
        }

        let follow_links = start_url.is_some();
        let mut frontier = self.seed_frontier(start_url);

        tracing::info!(
            "Starting crawl of {} (max {} pages, depth {})",
            self.settings.base_domain,
            self.settings.max_pages,
            self.settings.max_depth
        );

        let mut visited: HashSet<String> = HashSet::new();
        let mut output = CrawlOutput::default();

        loop {
            if self.abort.is_aborted() {
                tracing::warn!(
                    "Crawl aborted with {} candidates left in the frontier",
                    frontier.len()
                );
                output.aborted = true;
                break;
            }

            let Some(QueuedUrl { url, depth }) = frontier.pop() else {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            };

            let pages_crawled = self.ledger.pages_crawled();
            if let Decision::Skip(reason) =
                self.classifier.classify(&url, depth, pages_crawled, &visited)
            {
                tracing::debug!("Skipping {} at depth {}: {}", url, depth, reason);
                self.ledger
                    .record_page_skipped(url.as_str(), reason, depth, None)?;
                continue;
            }

            visited.insert(url.to_string());
            frontier.wait_turn().await;

            if let Some(page) = self.fetch(&url, depth, &mut visited).await? {
                if follow_links && self.ledger.pages_crawled() < u64::from(self.settings.max_pages)
                {
                    for link in &page.links {
                        match normalize_url(link) {
                            Ok(normalized) => frontier.push(normalized, depth + 1),
                            Err(e) => tracing::debug!("Dropping link {}: {}", link, e),
                        }
                    }
                }
                output.pages.push(page.page);
            }
        }

        tracing::info!(
            "Crawl finished: {} pages crawled, {} skipped",
            self.ledger.pages_crawled(),
            self.ledger.pages_skipped()
        );

        Ok(output)
    }

    /// Logs in and returns the URL the crawl should start from
    async fn authenticate(&mut self, navigator: &mut AuthNavigator) -> Result<Url, SitemeterError> {
        match navigator.login(&mut self.browser).await? {
            AuthOutcome::Authenticated { landing } => {
                let start = navigator
                    .go_to_start(&mut self.browser, &self.settings.start_url, &landing)
                    .await;
                Ok(normalize_url(start.as_str())?)
            }
            AuthOutcome::Failed { detail } => Err(SitemeterError::LoginFailed { detail }),
        }
    }

    /// Prescriptive URLs first, in order and without repeats, then the start URL
    fn seed_frontier(&self, start_url: Option<Url>) -> Frontier {
        let mut frontier = Frontier::new(self.settings.politeness_delay);
        let mut seeded: Vec<&Url> = Vec::new();

        for url in &self.settings.prescriptive_urls {
            if !seeded.contains(&url) {
                seeded.push(url);
                frontier.push(url.clone(), 0);
            }
        }

        if let Some(start) = start_url {
            frontier.push(start, 0);
        }

        frontier
    }

    /// Fetches one URL, recording the outcome in the ledger
    ///
    /// Returns `None` if the fetch failed; the failure is recorded as a
    /// `navigation_error` skip.
    async fn fetch(
        &mut self,
        url: &Url,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> Result<Option<FetchedPage>, SitemeterError> {
        if let Err(e) = goto_within(&mut self.browser, url, self.settings.navigation_timeout).await
        {
            tracing::warn!("Failed to fetch {}: {}", url, e);
            self.ledger.record_page_skipped(
                url.as_str(),
                SkipReason::NavigationError,
                depth,
                Some(truncate_detail(&e.to_string())),
            )?;
            return Ok(None);
        }

        let final_url = self
            .browser
            .current_url()
            .cloned()
            .unwrap_or_else(|| url.clone());

        // A redirect target must stay on site and counts as visited too
        if let Ok(normalized) = normalize_url(final_url.as_str()) {
            if normalized != *url {
                let redirect_skip = if !is_same_site(&normalized, &self.settings.base_domain) {
                    Some(SkipReason::DomainMismatch)
                } else if visited.contains(normalized.as_str()) {
                    Some(SkipReason::Duplicate)
                } else {
                    None
                };

                if let Some(reason) = redirect_skip {
                    tracing::debug!("Skipping {}: redirected to {} ({})", url, normalized, reason);
                    self.ledger.record_page_skipped(
                        url.as_str(),
                        reason,
                        depth,
                        Some(truncate_detail(&format!("redirected to {}", normalized))),
                    )?;
                    return Ok(None);
                }
            }
            visited.insert(normalized.to_string());
        }

        let parsed = parse_html(self.browser.content().unwrap_or_default(), &final_url);
        let hash = content_hash(&parsed.text);

        self.ledger.record_page_crawled(url.as_str(), depth, &hash)?;
        tracing::info!(
            "[{}/{}] crawled {}",
            self.ledger.pages_crawled(),
            self.settings.max_pages,
            url
        );

        Ok(Some(FetchedPage {
            page: CrawledPage {
                url: url.to_string(),
                depth,
                title: parsed.title,
                text: parsed.text,
                content_hash: hash,
            },
            links: parsed.links,
        }))
    }
}

/// A crawled page plus the links found on it
struct FetchedPage {
    page: CrawledPage,
    links: Vec<String>,
}

/// Builds a coordinator over an HTTP browsing session from configuration
///
/// Resolves the crawl bounds, builds the cookie-keeping client and attaches
/// an auth navigator when `[auth]` requires a login.
pub fn http_coordinator(
    config: &Config,
    ledger: Arc<MetricsLedger>,
) -> Result<Coordinator<HttpBrowser>, SitemeterError> {
    let settings = CrawlSettings::from_config(config)?;
    let browser = HttpBrowser::from_config(&config.user_agent, settings.navigation_timeout)?;
    let timeout = settings.navigation_timeout;

    let mut coordinator = Coordinator::new(settings, browser, ledger);
    if let Some(auth) = config.login() {
        let credentials = Credentials::from_config(auth)?;
        coordinator = coordinator.with_auth(AuthNavigator::new(credentials, timeout));
    }

    Ok(coordinator)
}
