//! CSV sink: one row per claimed document

use crate::harvest::{DocumentReport, HarvestReport};
use crate::output::traits::{OutputResult, ReportSink};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Column order of the CSV file
pub const CSV_HEADER: [&str; 7] = [
    "url",
    "status",
    "is_sensitive",
    "severity",
    "categories",
    "rationale",
    "error",
];

#[derive(Debug, Serialize)]
struct Row<'a> {
    url: &'a str,
    status: &'static str,
    /// Empty when the document never reached the classifier
    is_sensitive: Option<bool>,
    severity: Option<&'static str>,
    categories: String,
    rationale: &'a str,
    error: Option<String>,
}

impl<'a> Row<'a> {
    fn from_document(document: &'a DocumentReport) -> Self {
        let finding = document.outcome.finding();
        Self {
            url: document.url.as_str(),
            status: document.state().to_db_string(),
            is_sensitive: finding.map(|f| f.is_sensitive),
            severity: finding.map(|f| f.severity_tag()),
            categories: finding.map(|f| f.categories.join(";")).unwrap_or_default(),
            rationale: finding.map(|f| f.rationale.as_str()).unwrap_or_default(),
            error: document.outcome.error_message(),
        }
    }
}

/// Writes the document table as CSV
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ReportSink for CsvSink {
    fn name(&self) -> &str {
        "CSV"
    }

    fn write_report(&self, report: &HarvestReport) -> OutputResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;

        // Written explicitly so an empty report still gets a header
        writer.write_record(CSV_HEADER)?;
        for document in &report.documents {
            writer.serialize(Row::from_document(document))?;
        }
        writer.flush()?;

        tracing::debug!(
            "Wrote {} rows to {}",
            report.documents.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::{sample_report, unclassified_report};

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_rows_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.csv");

        CsvSink::new(&path).write_report(&sample_report()).unwrap();
        let rows = read_rows(&path);

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], CSV_HEADER.map(str::to_string).to_vec());
        assert_eq!(
            rows[1],
            vec![
                "https://corp.example/hr/payroll.xlsx",
                "reported",
                "true",
                "high",
                "pii;financial",
                "Salary table with employee names",
                "",
            ]
        );
        assert_eq!(rows[2][2], "false");
        assert_eq!(rows[3][5], "Meeting notes, marked \"internal only\"");
        assert_eq!(rows[4][1], "fetch_failed");
        assert_eq!(rows[4][2], "");
        assert_eq!(rows[4][6], "HTTP 404 (https://corp.example/old.pdf)");
    }

    #[test]
    fn test_unclassified_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.csv");

        CsvSink::new(&path)
            .write_report(&unclassified_report())
            .unwrap();
        let rows = read_rows(&path);

        assert_eq!(rows[1][1], "unclassified");
        assert_eq!(rows[1][6], "API error: quota exceeded");
    }

    #[test]
    fn test_empty_report_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut report = sample_report();
        report.documents.clear();

        CsvSink::new(&path).write_report(&report).unwrap();

        assert_eq!(read_rows(&path).len(), 1);
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("findings.csv");
        assert!(CsvSink::new(&path).write_report(&sample_report()).is_err());
    }
}
