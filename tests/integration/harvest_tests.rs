//! End-to-end harvest runs against wiremock fixture sites

use crate::common::{
    docx, extractor, forbid, harvester, seed, serve, serve_page, settings, KeywordClassifier,
    SECRET_MARKER,
};
use docscoop::classify::GeminiClassifier;
use docscoop::config::{ClassifierConfig, DocumentsConfig};
use docscoop::crawler::{DocumentKind, DocumentRules};
use docscoop::harvest::DocumentOutcome;
use docscoop::state::DocumentState;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_every_document_reported_once() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/docs", "/public/memo.txt", "/budget.csv"]).await;
    serve_page(
        &server,
        "/docs",
        &["/plan.docx", "/notes.rtf", "/public/memo.txt", "/"],
    )
    .await;

    serve(
        &server,
        "/public/memo.txt",
        "text/plain",
        format!("Quarterly memo. {}", SECRET_MARKER),
    )
    .await;
    serve(&server, "/budget.csv", "text/csv", "item,cost\ncoffee,3\n").await;
    serve(
        &server,
        "/plan.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        docx(&["Merger plan", SECRET_MARKER]),
    )
    .await;
    serve(
        &server,
        "/notes.rtf",
        "application/rtf",
        r"{\rtf1 Picnic on Friday\par}",
    )
    .await;

    let report = harvester(
        settings(2),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.documents.len(), 4);
    assert_eq!(report.count(DocumentState::Reported), 4);
    assert_eq!(report.findings().count(), 4);
    assert_eq!(report.sensitive().count(), 2);

    let mut sensitive: Vec<String> = report
        .sensitive()
        .map(|f| f.document_url.path().to_string())
        .collect();
    sensitive.sort();
    assert_eq!(sensitive, vec!["/plan.docx", "/public/memo.txt"]);

    let kinds: Vec<_> = report.documents.iter().filter_map(|d| d.kind.clone()).collect();
    assert!(kinds.contains(&DocumentKind::Docx));
    assert!(kinds.contains(&DocumentKind::Rtf));

    assert_eq!(report.pages.fetched, 2);
    assert!(report.page_failures.is_empty());
}

#[tokio::test]
async fn test_depth_bound_never_fetches_beyond() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/b", "/c"]).await;
    serve_page(&server, "/b", &["/d"]).await;
    serve_page(&server, "/c", &["/d", "/c.txt"]).await;
    serve(&server, "/c.txt", "text/plain", "found at depth one").await;
    forbid(&server, "/d").await;

    let report = harvester(
        settings(1),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.pages.fetched, 3);
    assert_eq!(report.pages.beyond_depth, 2);
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].url.path(), "/c.txt");
}

#[tokio::test]
async fn test_extraction_failure_is_isolated() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/good.txt", "/broken.docx", "/fine.pdf"]).await;
    serve(&server, "/good.txt", "text/plain", "hello").await;
    serve(
        &server,
        "/broken.docx",
        "application/octet-stream",
        b"PK\x03\x04 truncated archive".to_vec(),
    )
    .await;
    serve(&server, "/fine.pdf", "application/pdf", "%PDF-1.4 plain text").await;

    let report = harvester(
        settings(1),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.documents.len(), 3);
    for document in &report.documents {
        if document.url.path() == "/broken.docx" {
            assert_eq!(document.state(), DocumentState::ExtractFailed);
        } else {
            assert_eq!(document.state(), DocumentState::Reported, "{}", document.url);
        }
    }
}

#[tokio::test]
async fn test_images_never_harvested() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/logo.png", "/photo.JPG", "/report.txt"]).await;
    serve(&server, "/report.txt", "text/plain", "annual report").await;
    forbid(&server, "/logo.png").await;
    forbid(&server, "/photo.JPG").await;

    let mut documents = DocumentsConfig::default();
    documents.include_extensions(["png", "jpg"]);

    let report = harvester(
        settings(1),
        DocumentRules::from_config(&documents),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].url.path(), "/report.txt");
}

#[tokio::test]
async fn test_login_page_behind_document_url() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/report.pdf", "/missing.pdf"]).await;
    serve(
        &server,
        "/report.pdf",
        "text/html",
        "<html><body><form>Please log in</form></body></html>",
    )
    .await;

    let report = harvester(
        settings(1),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.documents[0].state(), DocumentState::ExtractFailed);
    assert_eq!(
        report.documents[0].outcome,
        DocumentOutcome::ExtractFailed("content is not a document (text/html)".to_string())
    );
    assert_eq!(report.documents[1].state(), DocumentState::FetchFailed);
}

#[tokio::test]
async fn test_document_served_from_page_url() {
    let server = MockServer::start().await;

    serve_page(&server, "/", &["/download?id=7"]).await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                format!("%PDF-1.7 {}", SECRET_MARKER).into_bytes(),
                "application/pdf",
            ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = harvester(
        settings(2),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(KeywordClassifier),
    )
    .run(&seed(&server))
    .await;

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].found_on, None);
    assert_eq!(report.documents[0].kind, Some(DocumentKind::Pdf));
    assert_eq!(report.sensitive().count(), 1);
    assert_eq!(report.pages.documents, 1);
}

#[tokio::test]
async fn test_gemini_classifier_end_to_end() {
    let site = MockServer::start().await;
    let gemini = MockServer::start().await;

    serve_page(&site, "/", &["/salaries.csv", "/menu.txt"]).await;
    serve(&site, "/salaries.csv", "text/csv", "name,salary\nalice,120000\n").await;
    serve(&site, "/menu.txt", "text/plain", "Soup of the day: tomato").await;

    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .and(body_string_contains("alice,120000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{
                "text": r#"{"sensitive": true, "severity": "high", "categories": ["personal-info"], "rationale": "Employee salaries"}"#
            }]}}]
        })))
        .with_priority(1)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{
                "text": r#"{"sensitive": false, "severity": "none", "categories": [], "rationale": "Cafeteria menu"}"#
            }]}}]
        })))
        .mount(&gemini)
        .await;

    let classifier = GeminiClassifier::new(
        "test-key",
        &ClassifierConfig {
            model: "test-model".to_string(),
            endpoint: gemini.uri(),
            ..ClassifierConfig::default()
        },
    )
    .unwrap();

    let report = harvester(
        settings(1),
        DocumentRules::default(),
        Arc::new(extractor()),
        Arc::new(classifier),
    )
    .run(&seed(&site))
    .await;

    assert_eq!(report.count(DocumentState::Reported), 2);
    let sensitive: Vec<_> = report.sensitive().collect();
    assert_eq!(sensitive.len(), 1);
    assert_eq!(sensitive[0].document_url.path(), "/salaries.csv");
    assert_eq!(sensitive[0].categories, vec!["personal-info"]);
    assert_eq!(sensitive[0].rationale, "Employee salaries");
}
