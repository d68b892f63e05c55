//! Crawl frontier and fetch pacing
//!
//! This module handles:
//! - FIFO ordering of candidate URLs (breadth-first traversal)
//! - Respecting a minimum delay between consecutive fetches

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link depth from the start URL (prescriptive URLs sit at 0)
    pub depth: u32,
}

/// First-in first-out queue of candidates plus a politeness clock
///
/// Candidates are classified lazily when popped, so the same URL may be
/// queued more than once; the classifier reports later copies as duplicates.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,

    /// Minimum time between the start of consecutive fetches
    politeness_delay: Duration,

    last_fetch: Option<Instant>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `politeness_delay` - Minimum pause between fetches (zero disables it)
    pub fn new(politeness_delay: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            politeness_delay,
            last_fetch: None,
        }
    }

    /// Appends a candidate to the back of the queue
    pub fn push(&mut self, url: Url, depth: u32) {
        self.queue.push_back(QueuedUrl { url, depth });
    }

    /// Removes the oldest candidate
    pub fn pop(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waits until the politeness delay since the previous fetch has passed,
    /// then marks the start of a new fetch
    pub async fn wait_turn(&mut self) {
        if let Some(last) = self.last_fetch {
            let elapsed = last.elapsed();
            if elapsed < self.politeness_delay {
                let remaining = self.politeness_delay - elapsed;
                tracing::trace!("Politeness delay: waiting {:?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }
        self.last_fetch = Some(Instant::now());
    }
}
