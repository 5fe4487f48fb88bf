//! Harvest results written through every sink

use crate::common::{extractor, harvester, seed, serve, serve_page, settings, KeywordClassifier, SECRET_MARKER};
use docscoop::crawler::DocumentRules;
use docscoop::output::{write_all, CsvSink, MarkdownSink, ReportSink, SqliteSink, CSV_HEADER};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::MockServer;

async fn fixture_report() -> (MockServer, docscoop::HarvestReport) {
    let server = MockServer::start().await;
    serve_page(&server, "/", &["/keys.txt", "/faq.txt", "/gone.pdf"]).await;
    serve(
        &server,
        "/keys.txt",
        "text/plain",
        format!("{}: aws key AKIA...", SECRET_MARKER),
    )
    .await;
    serve(&server, "/faq.txt", "text/plain", "Frequently asked questions").await;

    let report = harvester(
        settings(1),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;
    (server, report)
}

#[tokio::test]
async fn test_all_sinks() {
    let (server, report) = fixture_report().await;
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("findings.csv");
    let md_path = dir.path().join("summary.md");
    let db_path = dir.path().join("results.db");

    let sinks: Vec<Box<dyn ReportSink>> = vec![
        Box::new(CsvSink::new(&csv_path)),
        Box::new(MarkdownSink::new(&md_path, Some("cafebabe".to_string()))),
        Box::new(SqliteSink::new(&db_path, Some("cafebabe".to_string()))),
    ];
    assert_eq!(write_all(&report, &sinks), 0);

    // CSV: header plus one row per document, in discovery order
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, CSV_HEADER.map(str::to_string).to_vec());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], format!("{}/keys.txt", server.uri()).as_str());
    assert_eq!(&rows[0][1], "reported");
    assert_eq!(&rows[0][2], "true");
    assert_eq!(&rows[0][3], "high");
    assert_eq!(&rows[1][2], "false");
    assert_eq!(&rows[2][1], "fetch_failed");
    assert!(rows[2][6].starts_with("HTTP 404"));

    // Markdown
    let md = std::fs::read_to_string(&md_path).unwrap();
    assert!(md.contains("- **Config Hash**: cafebabe"));
    assert!(md.contains("- **Mode**: direct"));
    assert!(md.contains("keys.txt"));

    // SQLite
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let sensitive: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM documents WHERE is_sensitive = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(sensitive, 1);
    let hash: String = conn
        .query_row("SELECT config_hash FROM runs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(hash, "cafebabe");
}
