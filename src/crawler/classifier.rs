//! Pre-fetch classification of frontier candidates
//!
//! Every candidate popped from the frontier is classified before any network
//! access. Rules are checked in a fixed order and the first match wins:
//!
//! | Order | Condition | Outcome |
//! |-------|-----------|---------|
//! | 1 | pages crawled >= max pages | `max_limit_reached` |
//! | 2 | URL already visited | `duplicate` |
//! | 3 | depth > max depth | `max_depth_exceeded` |
//! | 4 | host differs from base domain | `domain_mismatch` |
//! | 5 | otherwise | proceed |

use crate::metrics::SkipReason;
use crate::url::is_same_site;
use std::collections::HashSet;
use url::Url;

/// Outcome of classifying one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip(SkipReason),
}

/// Applies the crawl bounds to a candidate URL
#[derive(Debug, Clone)]
pub struct SkipClassifier {
    max_pages: u32,
    max_depth: u32,
    base_domain: String,
}

impl SkipClassifier {
    /// Creates a classifier for one session
    ///
    /// # Arguments
    ///
    /// * `max_pages` - Maximum number of pages to crawl
    /// * `max_depth` - Maximum link depth from the start URL
    /// * `base_domain` - Host key (host plus non-default port) of the site
    pub fn new(max_pages: u32, max_depth: u32, base_domain: impl Into<String>) -> Self {
        Self {
            max_pages,
            max_depth,
            base_domain: base_domain.into().to_lowercase(),
        }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Classifies a candidate
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized candidate URL
    /// * `depth` - Link depth at which the candidate was discovered
    /// * `pages_crawled` - Pages successfully crawled so far
    /// * `visited` - Normalized URLs already fetched or attempted
    pub fn classify(
        &self,
        url: &Url,
        depth: u32,
        pages_crawled: u64,
        visited: &HashSet<String>,
    ) -> Decision {
        if pages_crawled >= u64::from(self.max_pages) {
            return Decision::Skip(SkipReason::MaxLimitReached);
        }

        if visited.contains(url.as_str()) {
            return Decision::Skip(SkipReason::Duplicate);
        }

        if depth > self.max_depth {
            return Decision::Skip(SkipReason::MaxDepthExceeded);
        }

        if !is_same_site(url, &self.base_domain) {
            return Decision::Skip(SkipReason::DomainMismatch);
        }

        Decision::Proceed
    }
}
