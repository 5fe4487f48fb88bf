//! Crawl frontier and visited-set management
//!
//! This module handles:
//! - The FIFO frontier of pages waiting to be fetched
//! - Visited-set deduplication for pages and documents
//! - The depth bound, host scope and page ceiling
//!
//! All state sits behind one mutex so "check visited, then insert" is atomic
//! even when many workers report links from different pages at once.

use crate::url::{extract_host, in_scope, normalize_parsed};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use url::Url;

/// A page waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized absolute URL
    pub url: Url,

    /// Link distance from the seed (seed is 0)
    pub depth: u32,
}

/// Returned by `next()` when nothing is queued
///
/// This is normal termination, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("crawl frontier is empty")]
pub struct FrontierEmpty;

/// Which branch `enqueue` took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadyVisited,
    DepthExceeded,
    OutOfScope,
    LimitReached,
    /// Not an http(s) URL with a host
    Invalid,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

#[derive(Debug, Default)]
struct Frontier {
    queue: VecDeque<CrawlTask>,
    visited_pages: HashSet<String>,
    claimed_documents: HashSet<String>,
}

/// Scheduler manages the frontier and the visited sets
///
/// Pages and documents are deduplicated in separate namespaces: a URL first
/// seen as a page link and later as a document link is tracked once in each.
#[derive(Debug)]
pub struct CrawlScheduler {
    scope_host: String,
    max_depth: u32,
    max_pages: Option<u32>,
    state: Mutex<Frontier>,
}

impl CrawlScheduler {
    /// Creates a scheduler scoped to the seed's host and queues the seed at depth 0
    ///
    /// # Arguments
    ///
    /// * `seed` - The starting URL; its host becomes the crawl scope
    /// * `max_depth` - Links further than this from the seed are not queued
    /// * `max_pages` - Optional ceiling on the number of pages ever queued
    pub fn new(seed: &Url, max_depth: u32, max_pages: Option<u32>) -> Self {
        let scheduler = Self {
            scope_host: extract_host(seed).unwrap_or_default(),
            max_depth,
            max_pages,
            state: Mutex::new(Frontier::default()),
        };
        let outcome = scheduler.enqueue(seed, 0);
        tracing::debug!("Seed {} enqueue: {:?}", seed, outcome);
        scheduler
    }

    fn lock(&self) -> MutexGuard<'_, Frontier> {
        // A worker panicking while holding the lock leaves the sets usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope_host(&self) -> &str {
        &self.scope_host
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// True if the URL's host matches the seed host
    pub fn in_scope(&self, url: &Url) -> bool {
        in_scope(url, &self.scope_host)
    }

    /// Queues a page if it is new, in scope and within the bounds
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL; normalized before lookup
    /// * `depth` - Link distance from the seed
    ///
    /// # Returns
    ///
    /// The branch taken; only `Queued` changes any state.
    pub fn enqueue(&self, url: &Url, depth: u32) -> EnqueueOutcome {
        let Ok(url) = normalize_parsed(url.clone()) else {
            return EnqueueOutcome::Invalid;
        };

        if depth > self.max_depth {
            return EnqueueOutcome::DepthExceeded;
        }
        if !self.in_scope(&url) {
            return EnqueueOutcome::OutOfScope;
        }

        let mut state = self.lock();

        if state.visited_pages.contains(url.as_str()) {
            return EnqueueOutcome::AlreadyVisited;
        }
        if let Some(limit) = self.max_pages {
            if state.visited_pages.len() >= limit as usize {
                return EnqueueOutcome::LimitReached;
            }
        }

        state.visited_pages.insert(url.as_str().to_string());
        state.queue.push_back(CrawlTask { url, depth });
        EnqueueOutcome::Queued
    }

    /// Pops the oldest queued page
    pub fn next(&self) -> Result<CrawlTask, FrontierEmpty> {
        self.lock().queue.pop_front().ok_or(FrontierEmpty)
    }

    /// Claims a document URL for harvesting
    ///
    /// # Returns
    ///
    /// `true` exactly once per normalized URL; `false` for repeats and
    /// invalid URLs.
    pub fn claim_document(&self, url: &Url) -> bool {
        let Ok(url) = normalize_parsed(url.clone()) else {
            return false;
        };
        self.lock().claimed_documents.insert(url.as_str().to_string())
    }

    /// Number of pages waiting in the frontier
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of distinct pages ever queued
    pub fn visited_pages(&self) -> usize {
        self.lock().visited_pages.len()
    }

    /// Number of distinct documents claimed
    pub fn claimed_documents(&self) -> usize {
        self.lock().claimed_documents.len()
    }
}
