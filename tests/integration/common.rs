//! Fixture helpers shared by the integration tests

use async_trait::async_trait;
use docscoop::classify::{ClassificationError, Classifier, Severity, Verdict};
use docscoop::crawler::DocumentRules;
use docscoop::extract::{BuiltinExtractor, Extractor};
use docscoop::harvest::{HarvestSettings, Harvester};
use docscoop::transport::{ClientOptions, ReqwestFetch, RetryPolicy, Transport};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Marks a document as sensitive for [`KeywordClassifier`]
pub const SECRET_MARKER: &str = "CONFIDENTIAL";

/// Sensitive whenever the text contains [`SECRET_MARKER`]
pub struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, _url: &Url, text: &str) -> Result<Verdict, ClassificationError> {
        if text.contains(SECRET_MARKER) {
            Ok(Verdict {
                is_sensitive: true,
                categories: vec!["internal".to_string()],
                rationale: "Marked confidential".to_string(),
                severity: Severity::High,
            })
        } else {
            Ok(Verdict::not_sensitive("Nothing notable"))
        }
    }
}

/// An HTML page linking to each href
pub fn html(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<li><a href=\"{}\">{}</a></li>\n", href, href))
        .collect();
    format!(
        "<!DOCTYPE html><html><head><title>Fixture</title></head><body><ul>\n{}</ul></body></html>",
        anchors
    )
}

/// Mounts a GET handler answering `body` with `content_type`
pub async fn serve(server: &MockServer, route: &str, content_type: &str, body: impl Into<Vec<u8>>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.into(), content_type),
        )
        .mount(server)
        .await;
}

pub async fn serve_page(server: &MockServer, route: &str, links: &[&str]) {
    serve(server, route, "text/html; charset=utf-8", html(links)).await;
}

/// Mounts a handler that must never be hit
pub async fn forbid(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

/// Builds a minimal Word document
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn settings(max_depth: u32) -> HarvestSettings {
    HarvestSettings {
        max_depth,
        max_pages: None,
        concurrency: 4,
        page_timeout: Duration::from_secs(5),
        document_timeout: Duration::from_secs(5),
        max_duration: None,
        allow_offsite_documents: true,
    }
}

/// Built-in extractor that reads PDFs with `cat`
pub fn extractor() -> BuiltinExtractor {
    let mut commands = BTreeMap::new();
    commands.insert("pdf".to_string(), vec!["cat".to_string()]);
    BuiltinExtractor::new(commands, Duration::from_secs(5))
}

/// A direct (non-anonymous) harvester against real HTTP
pub fn harvester(
    settings: HarvestSettings,
    rules: DocumentRules,
    extractor: Arc<dyn Extractor>,
    classifier: Arc<dyn Classifier>,
) -> Harvester {
    let options = ClientOptions::default();
    let transport = Transport::new(
        Arc::new(ReqwestFetch::new(&options).unwrap()),
        None,
        RetryPolicy::new(1, Duration::from_millis(10)),
        10 * 1024 * 1024,
    );
    Harvester::new(settings, rules, Arc::new(transport), extractor, classifier)
}

pub fn seed(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}
