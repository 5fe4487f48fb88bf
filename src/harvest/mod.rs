//! Harvest orchestration
//!
//! A [`Harvester`] drives one run from a seed URL:
//! - Page tasks fetch HTML and feed links back into the [`CrawlScheduler`]
//! - Document tasks fetch, extract and classify each claimed document
//! - At most `concurrency` tasks are in flight at any time
//!
//! A failing or panicking task never stops the run; it becomes a failure
//! entry in the [`HarvestReport`].

mod report;
mod worker;

pub use report::{DocumentOutcome, DocumentReport, Finding, HarvestReport, PageFailure, PageStats};

use crate::classify::Classifier;
use crate::config::CrawlerConfig;
use crate::crawler::{CrawlScheduler, CrawlTask, DocumentRules, FrontierEmpty};
use crate::extract::Extractor;
use crate::state::{DocumentState, PageState};
use crate::transport::Transport;
use chrono::Utc;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;
use worker::{crawl_page, harvest_document, panic_message, Completed, DocumentJob, PageDone, Shared};

/// Bounds and timeouts for one run
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub max_depth: u32,
    pub max_pages: Option<u32>,
    pub concurrency: usize,
    pub page_timeout: Duration,
    pub document_timeout: Duration,
    /// Stop dispatching new pages after this long
    pub max_duration: Option<Duration>,
    /// Harvest document links that point at other hosts
    pub allow_offsite_documents: bool,
}

impl HarvestSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            concurrency: config.concurrency.max(1) as usize,
            page_timeout: config.page_timeout(),
            document_timeout: config.document_timeout(),
            max_duration: config.max_duration(),
            allow_offsite_documents: config.allow_offsite_documents,
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Runs the crawl and harvest pipeline
pub struct Harvester {
    settings: HarvestSettings,
    rules: Arc<DocumentRules>,
    transport: Arc<Transport>,
    extractor: Arc<dyn Extractor>,
    classifier: Arc<dyn Classifier>,
}

impl Harvester {
    /// Creates a harvester
    ///
    /// # Arguments
    ///
    /// * `settings` - Depth, page and time bounds plus concurrency
    /// * `rules` - Which links and responses count as documents
    /// * `transport` - Fetches with retry, through Tor when anonymous
    /// * `extractor` - Turns document bytes into text
    /// * `classifier` - Judges extracted text
    pub fn new(
        settings: HarvestSettings,
        rules: DocumentRules,
        transport: Arc<Transport>,
        extractor: Arc<dyn Extractor>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            settings,
            rules: Arc::new(rules),
            transport,
            extractor,
            classifier,
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Crawls from `seed` and harvests every document found
    ///
    /// The run ends when the frontier is empty and no task is in flight.
    /// Once the wall-clock ceiling passes, no new page is dispatched but
    /// already claimed documents are still processed.
    pub async fn run(&self, seed: &Url) -> HarvestReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let concurrency = self.settings.concurrency.max(1);

        let shared = Arc::new(Shared::new(
            CrawlScheduler::new(seed, self.settings.max_depth, self.settings.max_pages),
            self.rules.clone(),
            self.transport.clone(),
            self.extractor.clone(),
            self.classifier.clone(),
            self.settings.clone(),
        ));

        tracing::info!(
            "Starting harvest of {} (max depth {}, concurrency {}, {})",
            seed,
            self.settings.max_depth,
            concurrency,
            if self.transport.is_anonymous() {
                "anonymous"
            } else {
                "direct"
            }
        );

        let mut tasks: JoinSet<Completed> = JoinSet::new();
        let mut waiting: VecDeque<DocumentJob> = VecDeque::new();
        let mut documents = Vec::new();
        let mut page_failures = Vec::new();
        let mut offsite_skipped = Vec::new();
        let mut pages = PageStats::default();
        let mut deadline_reached = false;
        let mut completed = 0usize;

        loop {
            while tasks.len() < concurrency {
                if let Some(job) = waiting.pop_front() {
                    spawn_document(&mut tasks, shared.clone(), job);
                    continue;
                }

                if !deadline_reached && self.deadline_passed(clock) {
                    deadline_reached = true;
                    tracing::warn!(
                        "Time limit reached after {:?}; no new pages will be fetched",
                        clock.elapsed()
                    );
                }
                if deadline_reached {
                    break;
                }

                match shared.scheduler.next() {
                    Ok(task) => {
                        pages.fetched += 1;
                        spawn_page(&mut tasks, shared.clone(), task);
                    }
                    Err(FrontierEmpty) => break,
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok(Completed::Page(done)) => {
                    record_page(&mut pages, &mut page_failures, &done);
                    waiting.extend(done.documents);
                    offsite_skipped.extend(done.offsite);
                }
                Ok(Completed::Document(report)) => documents.push(report),
                // Panics are caught inside the task; this is cancellation
                Err(e) => tracing::error!("Harvest task did not complete: {}", e),
            }

            completed += 1;
            if completed % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages fetched, {} in frontier, {} documents claimed, {} done",
                    pages.fetched,
                    shared.scheduler.pending(),
                    shared.scheduler.claimed_documents(),
                    documents.len()
                );
            }
        }

        pages.abandoned = shared.scheduler.pending();
        documents.sort_by_key(|d| d.sequence);

        let report = HarvestReport {
            seed: seed.clone(),
            started_at,
            finished_at: Utc::now(),
            anonymous: self.transport.is_anonymous(),
            documents,
            page_failures,
            offsite_skipped,
            pages,
            transport: self.transport.stats(),
            deadline_reached,
        };

        tracing::info!(
            "Harvest completed in {:?}: {} pages, {} documents, {} sensitive",
            clock.elapsed(),
            report.pages.fetched,
            report.documents.len(),
            report.sensitive().count()
        );
        for state in DocumentState::terminal_states() {
            tracing::debug!("  {}: {}", state, report.count(state));
        }

        report
    }

    fn deadline_passed(&self, clock: Instant) -> bool {
        self.settings
            .max_duration
            .is_some_and(|limit| clock.elapsed() >= limit)
    }
}

fn record_page(stats: &mut PageStats, failures: &mut Vec<PageFailure>, done: &PageDone) {
    stats.beyond_depth += done.beyond_depth;
    stats.beyond_limit += done.beyond_limit;

    match done.state {
        PageState::PageExpanded => stats.expanded += 1,
        PageState::DocumentCandidate => stats.documents += 1,
        PageState::Skipped => stats.skipped += 1,
        PageState::Failed => {
            stats.failed += 1;
            failures.push(PageFailure {
                url: done.task.url.clone(),
                depth: done.task.depth,
                error: done.error.clone().unwrap_or_default(),
            });
        }
        PageState::Queued | PageState::Fetching => {
            tracing::error!("Page {} finished in state {}", done.task.url, done.state);
        }
    }
}

fn spawn_page(tasks: &mut JoinSet<Completed>, shared: Arc<Shared>, task: CrawlTask) {
    tasks.spawn(async move {
        let fallback = task.clone();
        match AssertUnwindSafe(crawl_page(shared, task)).catch_unwind().await {
            Ok(done) => Completed::Page(done),
            Err(payload) => {
                let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
                tracing::error!("Page {}: {}", fallback.url, message);
                Completed::Page(PageDone::failed(fallback, message))
            }
        }
    });
}

fn spawn_document(tasks: &mut JoinSet<Completed>, shared: Arc<Shared>, job: DocumentJob) {
    tasks.spawn(async move {
        let sequence = job.sequence;
        let url = job.url.clone();
        let found_on = job.found_on.clone();
        match AssertUnwindSafe(harvest_document(shared, job)).catch_unwind().await {
            Ok(report) => Completed::Document(report),
            Err(payload) => {
                let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
                tracing::error!("Document {}: {}", url, message);
                Completed::Document(DocumentReport {
                    url,
                    found_on,
                    kind: None,
                    outcome: DocumentOutcome::ExtractFailed(message),
                    sequence,
                })
            }
        }
    });
}
