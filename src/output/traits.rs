//! Sink trait and the summary shared by the report formats

use crate::classify::Severity;
use crate::harvest::{Finding, HarvestReport};
use crate::state::DocumentState;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Something a finished harvest can be written to
pub trait ReportSink {
    /// Short label for log lines
    fn name(&self) -> &str;

    fn write_report(&self, report: &HarvestReport) -> OutputResult<()>;
}

/// Aggregated numbers for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub seed: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_seconds: u64,
    pub anonymous: bool,
    pub deadline_reached: bool,

    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub pages_abandoned: usize,

    pub documents: usize,
    /// Off-site document links that were not harvested
    pub offsite_skipped: usize,
    pub by_state: BTreeMap<&'static str, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub sensitive: usize,

    pub requests: u64,
    pub retries: u64,
    pub rotations: u64,
}

impl HarvestSummary {
    pub fn from_report(report: &HarvestReport) -> Self {
        let by_state = DocumentState::terminal_states()
            .into_iter()
            .map(|state| (state.to_db_string(), report.count(state)))
            .collect();

        let mut by_severity = BTreeMap::new();
        for finding in report.sensitive() {
            *by_severity.entry(finding.severity).or_insert(0) += 1;
        }

        Self {
            seed: report.seed.to_string(),
            started_at: report.started_at.to_rfc3339(),
            finished_at: report.finished_at.to_rfc3339(),
            duration_seconds: report.duration().as_secs(),
            anonymous: report.anonymous,
            deadline_reached: report.deadline_reached,
            pages_fetched: report.pages.fetched,
            pages_failed: report.pages.failed,
            pages_abandoned: report.pages.abandoned,
            documents: report.documents.len(),
            offsite_skipped: report.offsite_skipped.len(),
            by_state,
            by_severity,
            sensitive: report.sensitive().count(),
            requests: report.transport.requests,
            retries: report.transport.retries,
            rotations: report.transport.rotations,
        }
    }

    /// Percentage of documents that reached a verdict
    pub fn classified_rate(&self) -> f64 {
        if self.documents == 0 {
            return 0.0;
        }
        let reported = self.by_state.get("reported").copied().unwrap_or(0);
        (reported as f64 / self.documents as f64) * 100.0
    }
}

/// Sensitive findings, most severe first, stable within a severity
pub fn ranked_findings(report: &HarvestReport) -> Vec<&Finding> {
    let mut findings: Vec<&Finding> = report.sensitive().collect();
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    findings
}
