//! SQLite sink
//!
//! Each harvest appends one row to `runs` plus its documents and failed
//! pages, so a database accumulates the history of every run against it.

use crate::harvest::HarvestReport;
use crate::output::traits::{OutputResult, ReportSink};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvest
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seed TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT,
    anonymous INTEGER NOT NULL,
    pages_fetched INTEGER NOT NULL,
    requests INTEGER NOT NULL,
    rotations INTEGER NOT NULL,
    deadline_reached INTEGER NOT NULL
);

-- Every claimed document and how it ended
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    found_on TEXT,
    kind TEXT,
    state TEXT NOT NULL,
    is_sensitive INTEGER,
    severity TEXT,
    categories TEXT,
    rationale TEXT,
    error_message TEXT,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_documents_run ON documents(run_id);
CREATE INDEX IF NOT EXISTS idx_documents_state ON documents(state);

-- Pages that could not be fetched
CREATE TABLE IF NOT EXISTS page_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    error_message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_failures_run ON page_failures(run_id);

-- Off-site document links that were not harvested
CREATE TABLE IF NOT EXISTS offsite_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL
);
"#;

/// Appends harvest results to a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
    config_hash: Option<String>,
}

impl SqliteSink {
    pub fn new(path: impl AsRef<Path>, config_hash: Option<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config_hash,
        }
    }

    fn open(&self) -> OutputResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(conn)
    }

    /// Writes one run in a single transaction
    ///
    /// # Returns
    ///
    /// * `Ok(i64)` - ID of the new `runs` row
    /// * `Err(OutputError)` - Failed to open or write the database
    pub fn record(&self, report: &HarvestReport) -> OutputResult<i64> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (seed, started_at, finished_at, config_hash, anonymous,
                               pages_fetched, requests, rotations, deadline_reached)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.seed.as_str(),
                report.started_at.to_rfc3339(),
                report.finished_at.to_rfc3339(),
                self.config_hash,
                report.anonymous,
                report.pages.fetched as i64,
                report.transport.requests as i64,
                report.transport.rotations as i64,
                report.deadline_reached,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare(
                "INSERT INTO documents (run_id, url, found_on, kind, state, is_sensitive,
                                        severity, categories, rationale, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for document in &report.documents {
                let finding = document.outcome.finding();
                insert.execute(params![
                    run_id,
                    document.url.as_str(),
                    document.found_on.as_ref().map(|u| u.as_str()),
                    document.kind.as_ref().map(|k| k.extension().to_string()),
                    document.state().to_db_string(),
                    finding.map(|f| f.is_sensitive),
                    finding.map(|f| f.severity_tag()),
                    finding.map(|f| f.categories.join(";")),
                    finding.map(|f| f.rationale.as_str()),
                    document.outcome.error_message(),
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO page_failures (run_id, url, depth, error_message)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for failure in &report.page_failures {
                insert.execute(params![
                    run_id,
                    failure.url.as_str(),
                    failure.depth,
                    failure.error
                ])?;
            }

            let mut insert =
                tx.prepare("INSERT INTO offsite_documents (run_id, url) VALUES (?1, ?2)")?;
            for url in &report.offsite_skipped {
                insert.execute(params![run_id, url.as_str()])?;
            }
        }

        tx.commit()?;
        Ok(run_id)
    }
}

impl ReportSink for SqliteSink {
    fn name(&self) -> &str {
        "SQLite"
    }

    fn write_report(&self, report: &HarvestReport) -> OutputResult<()> {
        let run_id = self.record(report)?;
        tracing::debug!("Recorded run {} in {}", run_id, self.path.display());
        Ok(())
    }
}
