/// Lifecycle states for crawl and harvest tasks
///
/// Page tasks and document tasks run through separate state machines. The
/// orchestrator moves each task forward with `can_transition_to` checks so an
/// out-of-order transition shows up in tests instead of silently corrupting
/// the report.
use std::fmt;

/// Represents the current state of a page task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Page is in the frontier waiting for a worker
    Queued,

    /// Page is being downloaded
    Fetching,

    // ===== Terminal States =====
    /// HTML was parsed and its links fed back into the scheduler
    PageExpanded,

    /// The URL served a document; it continues as a document task
    DocumentCandidate,

    /// The URL served something that is neither HTML nor a document
    Skipped,

    /// The fetch failed after all retries, or returned a non-2xx status
    Failed,
}

impl PageState {
    /// Returns true if no further processing happens for this page
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Fetching)
    }

    /// Returns true if moving to `next` is a legal step
    pub fn can_transition_to(&self, next: PageState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Fetching)
                | (
                    Self::Fetching,
                    Self::PageExpanded | Self::DocumentCandidate | Self::Skipped | Self::Failed
                )
        )
    }

    /// Converts the page state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::PageExpanded => "page_expanded",
            Self::DocumentCandidate => "document_candidate",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Represents the current state of a document task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    // ===== Active States =====
    /// Document bytes are being downloaded
    Fetching,

    /// Text was extracted; waiting for the classifier
    Extracted,

    /// Classifier returned a verdict
    Classified,

    // ===== Terminal States =====
    /// A finding was emitted
    Reported,

    /// Text extraction failed, or the content was not a document
    ExtractFailed,

    /// Download failed after all retries, or returned a non-2xx status
    FetchFailed,

    /// Extraction worked but the classifier failed
    Unclassified,
}

impl DocumentState {
    /// Returns true if no further processing happens for this document
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Reported | Self::ExtractFailed | Self::FetchFailed | Self::Unclassified
        )
    }

    /// Returns true if moving to `next` is a legal step
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        matches!(
            (self, next),
            (
                Self::Fetching,
                Self::Extracted | Self::ExtractFailed | Self::FetchFailed
            ) | (Self::Extracted, Self::Classified | Self::Unclassified)
                | (Self::Classified, Self::Reported)
        )
    }

    /// Converts the document state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Extracted => "extracted",
            Self::Classified => "classified",
            Self::Reported => "reported",
            Self::ExtractFailed => "extract_failed",
            Self::FetchFailed => "fetch_failed",
            Self::Unclassified => "unclassified",
        }
    }

    /// Parses a document state from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetching" => Some(Self::Fetching),
            "extracted" => Some(Self::Extracted),
            "classified" => Some(Self::Classified),
            "reported" => Some(Self::Reported),
            "extract_failed" => Some(Self::ExtractFailed),
            "fetch_failed" => Some(Self::FetchFailed),
            "unclassified" => Some(Self::Unclassified),
            _ => None,
        }
    }

    /// The four categories every harvested document ends up in
    pub fn terminal_states() -> [Self; 4] {
        [
            Self::Reported,
            Self::ExtractFailed,
            Self::FetchFailed,
            Self::Unclassified,
        ]
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
