//! Page and document tasks run by the harvest workers

use crate::classify::Classifier;
use crate::crawler::{
    discover, is_html_response, CrawlScheduler, CrawlTask, DocumentRules, EnqueueOutcome,
};
use crate::extract::Extractor;
use crate::harvest::report::{DocumentOutcome, DocumentReport, Finding};
use crate::harvest::HarvestSettings;
use crate::state::{DocumentState, PageState};
use crate::transport::{FetchResponse, Transport};
use crate::url::normalize_parsed;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// State shared by every task of one run
pub(crate) struct Shared {
    pub scheduler: CrawlScheduler,
    pub rules: Arc<DocumentRules>,
    pub transport: Arc<Transport>,
    pub extractor: Arc<dyn Extractor>,
    pub classifier: Arc<dyn Classifier>,
    pub settings: HarvestSettings,
    sequence: AtomicU64,
}

impl Shared {
    pub fn new(
        scheduler: CrawlScheduler,
        rules: Arc<DocumentRules>,
        transport: Arc<Transport>,
        extractor: Arc<dyn Extractor>,
        classifier: Arc<dyn Classifier>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            scheduler,
            rules,
            transport,
            extractor,
            classifier,
            settings,
            sequence: AtomicU64::new(0),
        }
    }

    /// Claims a document and assigns its report position
    ///
    /// Off-site documents are claimed too when they are not harvested, so
    /// each one is recorded once.
    fn claim(
        &self,
        url: &Url,
        found_on: Option<&Url>,
        prefetched: Option<FetchResponse>,
    ) -> Claim {
        if !self.scheduler.claim_document(url) {
            return Claim::Duplicate;
        }

        let url = normalize_parsed(url.clone()).unwrap_or_else(|_| url.clone());
        if !self.settings.allow_offsite_documents && !self.scheduler.in_scope(&url) {
            tracing::info!("Not harvesting off-site document {}", url);
            return Claim::Offsite(url);
        }

        Claim::Job(DocumentJob {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            url,
            found_on: found_on.cloned(),
            prefetched,
        })
    }
}

enum Claim {
    Job(DocumentJob),
    Offsite(Url),
    Duplicate,
}

/// A claimed document waiting for a worker
pub(crate) struct DocumentJob {
    pub sequence: u64,
    pub url: Url,
    pub found_on: Option<Url>,
    /// Response already fetched as a page, reused instead of a second fetch
    pub prefetched: Option<FetchResponse>,
}

/// Terminal page state plus what the page contributed
pub(crate) struct PageDone {
    pub task: CrawlTask,
    pub state: PageState,
    pub error: Option<String>,
    pub beyond_depth: usize,
    pub beyond_limit: usize,
    pub documents: Vec<DocumentJob>,
    /// Off-site document links left alone
    pub offsite: Vec<Url>,
}

impl PageDone {
    fn new(task: CrawlTask, state: PageState) -> Self {
        Self {
            task,
            state,
            error: None,
            beyond_depth: 0,
            beyond_limit: 0,
            documents: Vec::new(),
            offsite: Vec::new(),
        }
    }

    fn add(&mut self, claim: Claim) {
        match claim {
            Claim::Job(job) => self.documents.push(job),
            Claim::Offsite(url) => self.offsite.push(url),
            Claim::Duplicate => {}
        }
    }

    pub fn failed(task: CrawlTask, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(task, PageState::Failed)
        }
    }
}

pub(crate) enum Completed {
    Page(PageDone),
    Document(DocumentReport),
}

fn advance_page(state: &mut PageState, next: PageState) {
    debug_assert!(state.can_transition_to(next), "page {} -> {}", state, next);
    *state = next;
}

fn advance_document(state: &mut DocumentState, next: DocumentState) {
    debug_assert!(state.can_transition_to(next), "document {} -> {}", state, next);
    *state = next;
}

/// Fetches one page and feeds its links back into the scheduler
pub(crate) async fn crawl_page(shared: Arc<Shared>, task: CrawlTask) -> PageDone {
    let mut state = PageState::Queued;
    advance_page(&mut state, PageState::Fetching);

    let response = match shared
        .transport
        .fetch(&task.url, shared.settings.page_timeout)
        .await
        .and_then(FetchResponse::error_for_status)
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Page {} failed: {}", task.url, e.kind);
            advance_page(&mut state, PageState::Failed);
            return PageDone::failed(task, e.to_string());
        }
    };

    let content_type = response.content_type.clone();

    if shared
        .rules
        .is_document(&response.final_url, content_type.as_deref(), &response.body)
        .is_some()
    {
        advance_page(&mut state, PageState::DocumentCandidate);
        tracing::debug!("Page {} served a document", task.url);

        let mut done = PageDone::new(task, state);
        let url = done.task.url.clone();
        done.add(shared.claim(&url, None, Some(response)));
        return done;
    }

    if !is_html_response(content_type.as_deref(), &response.body) {
        advance_page(&mut state, PageState::Skipped);
        tracing::debug!(
            "Skipping {} ({})",
            task.url,
            content_type.as_deref().unwrap_or("no content type")
        );
        return PageDone::new(task, state);
    }

    let found = discover(&response.final_url, &response.body, &shared.rules);
    drop(response);

    advance_page(&mut state, PageState::PageExpanded);
    let mut done = PageDone::new(task, state);
    let next_depth = done.task.depth + 1;
    let mut queued = 0;

    for link in &found.pages {
        match shared.scheduler.enqueue(link, next_depth) {
            EnqueueOutcome::Queued => queued += 1,
            EnqueueOutcome::DepthExceeded => done.beyond_depth += 1,
            EnqueueOutcome::LimitReached => done.beyond_limit += 1,
            outcome => tracing::trace!("Not queueing {}: {:?}", link, outcome),
        }
    }

    for link in &found.documents {
        let claim = shared.claim(link, Some(&done.task.url), None);
        done.add(claim);
    }

    tracing::debug!(
        "Expanded {} (depth {}): {} new pages, {} new documents",
        done.task.url,
        done.task.depth,
        queued,
        done.documents.len()
    );

    done
}

/// Fetches, extracts and classifies one claimed document
pub(crate) async fn harvest_document(shared: Arc<Shared>, job: DocumentJob) -> DocumentReport {
    let DocumentJob {
        sequence,
        url,
        found_on,
        prefetched,
    } = job;
    let mut state = DocumentState::Fetching;

    let report = |kind, outcome| DocumentReport {
        url: url.clone(),
        found_on: found_on.clone(),
        kind,
        outcome,
        sequence,
    };

    let response = match prefetched {
        Some(response) => response,
        None => match shared
            .transport
            .fetch(&url, shared.settings.document_timeout)
            .await
            .and_then(FetchResponse::error_for_status)
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Document {} failed to download: {}", url, e.kind);
                advance_document(&mut state, DocumentState::FetchFailed);
                return report(None, DocumentOutcome::FetchFailed(e));
            }
        },
    };

    let FetchResponse {
        final_url,
        content_type,
        body,
        ..
    } = response;

    let Some(kind) = shared
        .rules
        .is_document(&final_url, content_type.as_deref(), &body)
    else {
        advance_document(&mut state, DocumentState::ExtractFailed);
        let served = content_type.unwrap_or_else(|| "unknown content".to_string());
        tracing::warn!("{} is not a document ({})", url, served);
        return report(
            None,
            DocumentOutcome::ExtractFailed(format!("content is not a document ({})", served)),
        );
    };

    let size = body.len();
    let text = match shared.extractor.extract(body, &kind).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Extraction failed for {}: {}", url, e);
            advance_document(&mut state, DocumentState::ExtractFailed);
            return report(Some(kind), DocumentOutcome::ExtractFailed(e.to_string()));
        }
    };
    advance_document(&mut state, DocumentState::Extracted);
    tracing::debug!(
        "Extracted {} chars from {} ({} bytes, {})",
        text.chars().count(),
        url,
        size,
        kind
    );

    let verdict = match shared.classifier.classify(&url, &text).await {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!("Classification failed for {}: {}", url, e);
            advance_document(&mut state, DocumentState::Unclassified);
            return report(Some(kind), DocumentOutcome::Unclassified(e));
        }
    };
    advance_document(&mut state, DocumentState::Classified);

    if verdict.is_sensitive {
        tracing::info!("Sensitive document: {} ({})", url, verdict.severity);
    } else {
        tracing::debug!("Not sensitive: {}", url);
    }

    advance_document(&mut state, DocumentState::Reported);
    report(
        Some(kind),
        DocumentOutcome::Reported(Finding::from_verdict(url.clone(), verdict)),
    )
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
