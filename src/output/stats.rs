//! Console summary of a harvest

use crate::harvest::HarvestReport;
use crate::output::traits::{ranked_findings, HarvestSummary};
use std::fmt::Write;

/// Prints the harvest summary to stdout
///
/// # Arguments
///
/// * `report` - The finished harvest
/// * `verbose` - Also print each finding's rationale and every failure
pub fn print_summary(report: &HarvestReport, verbose: bool) {
    print!("{}", format_summary(report, verbose));
}

/// Formats the console summary
pub fn format_summary(report: &HarvestReport, verbose: bool) -> String {
    let summary = HarvestSummary::from_report(report);
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Harvest Summary ===\n");
    let _ = writeln!(out, "Seed: {}", summary.seed);
    let _ = writeln!(
        out,
        "Mode: {}",
        if summary.anonymous { "anonymous" } else { "direct" }
    );
    let _ = writeln!(out, "Duration: {}s", summary.duration_seconds);
    let _ = writeln!(
        out,
        "Pages: {} fetched, {} failed",
        summary.pages_fetched, summary.pages_failed
    );
    if summary.deadline_reached {
        let _ = writeln!(
            out,
            "Time limit reached: {} pages left unvisited",
            summary.pages_abandoned
        );
    }
    if summary.offsite_skipped > 0 {
        let _ = writeln!(
            out,
            "Off-site documents not harvested: {}",
            summary.offsite_skipped
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Documents by State:");
    for (state, count) in &summary.by_state {
        let _ = writeln!(out, "  {}: {}", state, count);
    }
    let _ = writeln!(out);

    let findings = ranked_findings(report);
    if findings.is_empty() {
        let _ = writeln!(out, "No sensitive documents found.");
    } else {
        let _ = writeln!(out, "Sensitive Documents ({}):", findings.len());
        for finding in findings {
            let _ = writeln!(out, "  [{}] {}", finding.severity, finding.document_url);
            if verbose {
                if !finding.categories.is_empty() {
                    let _ = writeln!(out, "      categories: {}", finding.categories.join(", "));
                }
                let _ = writeln!(out, "      {}", finding.rationale);
            }
        }
    }

    if verbose {
        let failures: Vec<_> = report
            .documents
            .iter()
            .filter_map(|d| d.outcome.error_message().map(|e| (d, e)))
            .collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nFailed Documents ({}):", failures.len());
            for (document, error) in failures {
                let _ = writeln!(out, "  {} ({}): {}", document.url, document.state(), error);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_report;

    #[test]
    fn test_lists_sensitive_urls() {
        let out = format_summary(&sample_report(), false);

        assert!(out.contains("Sensitive Documents (2):"));
        assert!(out.contains("  [high] https://corp.example/hr/payroll.xlsx"));
        assert!(out.contains("  [low] https://corp.example/notes.txt"));
        assert!(!out.contains("menu.pdf"));
        assert!(!out.contains("Salary table"));
        assert!(!out.contains("Failed Documents"));
        assert!(out.contains("Off-site documents not harvested: 1"));
    }

    #[test]
    fn test_verbose_adds_rationale_and_failures() {
        let out = format_summary(&sample_report(), true);

        assert!(out.contains("      Salary table with employee names"));
        assert!(out.contains("      categories: pii, financial"));
        assert!(out.contains("Failed Documents (1):"));
        assert!(out.contains("https://corp.example/old.pdf (fetch_failed)"));
    }

    #[test]
    fn test_nothing_found() {
        let mut report = sample_report();
        report.documents.clear();
        report.offsite_skipped.clear();
        let out = format_summary(&report, false);
        assert!(out.contains("No sensitive documents found."));
        assert!(out.contains("  reported: 0"));
        assert!(!out.contains("Off-site"));
    }
}
