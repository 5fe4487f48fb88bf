//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a harvest,
//! including statistics, sensitive findings and failures.

use crate::harvest::HarvestReport;
use crate::output::traits::{ranked_findings, HarvestSummary, OutputResult, ReportSink};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Failures listed before the list is cut short
const MAX_LISTED_FAILURES: usize = 50;

/// Writes the markdown summary to a file
#[derive(Debug, Clone)]
pub struct MarkdownSink {
    path: PathBuf,
    config_hash: Option<String>,
}

impl MarkdownSink {
    /// Creates a markdown sink
    ///
    /// # Arguments
    ///
    /// * `path` - Where the summary is written
    /// * `config_hash` - Hash of the config file, shown in the run information
    pub fn new(path: impl AsRef<Path>, config_hash: Option<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config_hash,
        }
    }
}

impl ReportSink for MarkdownSink {
    fn name(&self) -> &str {
        "markdown summary"
    }

    fn write_report(&self, report: &HarvestReport) -> OutputResult<()> {
        let markdown = format_markdown_summary(report, self.config_hash.as_deref());

        let mut file = File::create(&self.path)?;
        file.write_all(markdown.as_bytes())?;

        Ok(())
    }
}

/// Formats a harvest report as markdown
///
/// # Arguments
///
/// * `report` - The finished harvest
/// * `config_hash` - Optional config hash for the run information block
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_summary(report: &HarvestReport, config_hash: Option<&str>) -> String {
    let summary = HarvestSummary::from_report(report);
    let mut md = String::new();

    md.push_str("# DocScoop Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        summary.duration_seconds,
        summary.duration_seconds as f64 / 60.0
    ));
    md.push_str(&format!(
        "- **Mode**: {}\n",
        if summary.anonymous { "anonymous (Tor)" } else { "direct" }
    ));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if summary.deadline_reached {
        md.push_str(&format!(
            "- **Stopped early**: time limit reached, {} pages left unvisited\n",
            summary.pages_abandoned
        ));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Fetched**: {}\n", summary.pages_fetched));
    md.push_str(&format!("- **Pages Failed**: {}\n", summary.pages_failed));
    md.push_str(&format!("- **Documents**: {}\n", summary.documents));
    md.push_str(&format!("- **Sensitive**: {}\n", summary.sensitive));
    if summary.offsite_skipped > 0 {
        md.push_str(&format!(
            "- **Off-site Documents Not Harvested**: {}\n",
            summary.offsite_skipped
        ));
    }
    md.push_str(&format!(
        "- **Classified Rate**: {:.2}%\n",
        summary.classified_rate()
    ));
    md.push_str(&format!(
        "- **Requests**: {} ({} retries, {} identity rotations)\n\n",
        summary.requests, summary.retries, summary.rotations
    ));

    // State breakdown
    md.push_str("## Document State Breakdown\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for (state, count) in &summary.by_state {
        md.push_str(&format!("| {} | {} |\n", state, count));
    }
    md.push('\n');

    // Sensitive findings
    let findings = ranked_findings(report);
    md.push_str("## Sensitive Documents\n\n");
    if findings.is_empty() {
        md.push_str("None found.\n\n");
    } else {
        md.push_str("| Severity | Document | Categories | Rationale |\n");
        md.push_str("|----------|----------|------------|-----------|\n");
        for finding in findings {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                finding.severity,
                finding.document_url,
                escape_cell(&finding.categories.join(", ")),
                escape_cell(&finding.rationale)
            ));
        }
        md.push('\n');
    }

    // Failures
    let failed: Vec<_> = report
        .documents
        .iter()
        .filter_map(|d| d.outcome.error_message().map(|e| (d, e)))
        .collect();
    if !failed.is_empty() {
        md.push_str("## Document Failures\n\n");
        md.push_str(&format!("Total: {}\n\n", failed.len()));
        for (document, error) in failed.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "- `{}` ({}): {}\n",
                document.url,
                document.state(),
                error
            ));
        }
        if failed.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                failed.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    if !report.page_failures.is_empty() {
        md.push_str("## Page Failures\n\n");
        for failure in report.page_failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!(
                "- `{}` (depth {}): {}\n",
                failure.url, failure.depth, failure.error
            ));
        }
        if report.page_failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.page_failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    if !report.offsite_skipped.is_empty() {
        md.push_str("## Off-site Documents (not harvested)\n\n");
        for url in report.offsite_skipped.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!("- `{}`\n", url));
        }
        if report.offsite_skipped.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.offsite_skipped.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by DocScoop*\n");

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
