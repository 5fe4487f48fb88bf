//! Output module for harvest results
//!
//! This module handles:
//! - Writing one CSV row per harvested document
//! - Generating a markdown summary of a run
//! - Recording runs, documents and failed pages in SQLite
//! - Printing the console summary

mod csv_output;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::{CsvSink, CSV_HEADER};
pub use markdown::{format_markdown_summary, MarkdownSink};
pub use sqlite_output::{SqliteSink, SCHEMA_SQL};
pub use stats::print_summary;
pub use traits::{ranked_findings, HarvestSummary, OutputError, OutputResult, ReportSink};

/// Writes the report to every sink
///
/// A failing sink is logged and does not stop the others.
///
/// # Returns
///
/// The number of sinks that failed
pub fn write_all(report: &crate::harvest::HarvestReport, sinks: &[Box<dyn ReportSink>]) -> usize {
    let mut failed = 0;
    for sink in sinks {
        match sink.write_report(report) {
            Ok(()) => tracing::info!("Wrote {} output", sink.name()),
            Err(e) => {
                tracing::error!("Failed to write {} output: {}", sink.name(), e);
                failed += 1;
            }
        }
    }
    failed
}
