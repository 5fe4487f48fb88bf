use crate::classify::{ClassificationError, Severity, Verdict};
use crate::crawler::DocumentKind;
use crate::state::DocumentState;
use crate::transport::{TransportError, TransportStats};
use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

/// Terminal artifact for a classified document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub document_url: Url,
    pub is_sensitive: bool,
    pub categories: Vec<String>,
    pub rationale: String,
    pub severity: Severity,
}

impl Finding {
    pub fn from_verdict(document_url: Url, verdict: Verdict) -> Self {
        Self {
            document_url,
            is_sensitive: verdict.is_sensitive,
            categories: verdict.categories,
            rationale: verdict.rationale,
            severity: verdict.severity,
        }
    }

    /// Severity as written to reports
    pub fn severity_tag(&self) -> &'static str {
        self.severity.as_str()
    }
}

/// How a claimed document ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Reported(Finding),
    /// Extraction failed, or the fetched content was not a document
    ExtractFailed(String),
    FetchFailed(TransportError),
    Unclassified(ClassificationError),
}

impl DocumentOutcome {
    pub fn state(&self) -> DocumentState {
        match self {
            Self::Reported(_) => DocumentState::Reported,
            Self::ExtractFailed(_) => DocumentState::ExtractFailed,
            Self::FetchFailed(_) => DocumentState::FetchFailed,
            Self::Unclassified(_) => DocumentState::Unclassified,
        }
    }

    pub fn finding(&self) -> Option<&Finding> {
        match self {
            Self::Reported(finding) => Some(finding),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Reported(_) => None,
            Self::ExtractFailed(message) => Some(message.clone()),
            Self::FetchFailed(e) => Some(e.to_string()),
            Self::Unclassified(e) => Some(e.to_string()),
        }
    }
}

/// One row of the report per claimed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    /// Normalized URL the document was claimed under
    pub url: Url,

    /// Page the link was found on; `None` when the page URL itself served
    /// the document
    pub found_on: Option<Url>,

    /// Kind the content was recognized as, if it got that far
    pub kind: Option<DocumentKind>,

    pub outcome: DocumentOutcome,

    /// Claim order, used to keep the report stable
    pub(crate) sequence: u64,
}

impl DocumentReport {
    pub fn state(&self) -> DocumentState {
        self.outcome.state()
    }
}

/// A page that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: Url,
    pub depth: u32,
    pub error: String,
}

/// Page-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Pages dispatched to a worker
    pub fetched: usize,
    /// HTML pages whose links were followed
    pub expanded: usize,
    /// Page URLs that served a document
    pub documents: usize,
    /// Responses that were neither HTML nor a document
    pub skipped: usize,
    pub failed: usize,
    /// Links not queued because they were beyond the depth bound
    pub beyond_depth: usize,
    /// Links not queued because the page ceiling was reached
    pub beyond_limit: usize,
    /// Pages still queued when the wall-clock ceiling hit
    pub abandoned: usize,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub seed: Url,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub anonymous: bool,
    /// One entry per claimed document, in claim order
    pub documents: Vec<DocumentReport>,
    pub page_failures: Vec<PageFailure>,
    /// Off-site document links found but not harvested
    pub offsite_skipped: Vec<Url>,
    pub pages: PageStats,
    pub transport: TransportStats,
    /// True if the wall-clock ceiling stopped page dispatch
    pub deadline_reached: bool,
}

impl HarvestReport {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.documents.iter().filter_map(|d| d.outcome.finding())
    }

    pub fn sensitive(&self) -> impl Iterator<Item = &Finding> {
        self.findings().filter(|f| f.is_sensitive)
    }

    pub fn count(&self, state: DocumentState) -> usize {
        self.documents.iter().filter(|d| d.state() == state).count()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
