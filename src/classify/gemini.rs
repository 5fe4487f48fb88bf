//! Gemini `generateContent` classifier

use crate::classify::{ClassificationError, Classifier, Severity, Verdict};
use crate::config::ClassifierConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Texts shorter than this are not worth a model call
pub const MIN_TEXT_CHARS: usize = 10;

const TOO_SHORT: &str = "Document is empty or too short.";

const INSTRUCTIONS: &str = "\
Analyze this document content and determine if it appears to be sensitive, private, \
or unintended for public release. Look for:

1. Personal information (names, addresses, phone numbers, SSNs, etc.)
2. Financial data (credit card numbers, bank accounts, etc.)
3. Internal/confidential business information (marked confidential, internal only, etc.)
4. Login credentials or API keys
5. Draft documents not meant for public consumption
6. Any information that seems inappropriate for public access

Respond with a single JSON object and nothing else:
{\"sensitive\": true|false, \"severity\": \"none\"|\"low\"|\"medium\"|\"high\", \
\"categories\": [short labels such as \"personal-info\", \"financial\", \"credentials\", \
\"internal\", \"draft\"], \"rationale\": \"one or two sentences\"}";

/// Classifier backed by the Gemini REST API
#[derive(Clone)]
pub struct GeminiClassifier {
    http_client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_chars: usize,
}

impl GeminiClassifier {
    /// Creates a classifier with an explicit API key
    pub fn new(api_key: impl Into<String>, config: &ClassifierConfig) -> Result<Self, ClassificationError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassificationError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_chars: config.max_chars,
        })
    }

    /// Reads the API key from the environment variable named in the config
    pub fn from_env(config: &ClassifierConfig) -> Result<Self, ClassificationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ClassificationError::Config(format!("{} not set", config.api_key_env))
            })?;
        Self::new(api_key, config)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(url: &Url, sample: &str) -> String {
        format!(
            "{}\n\nDocument URL: {}\n\nDocument sample text:\n{}",
            INSTRUCTIONS, url, sample
        )
    }

    async fn generate(&self, prompt: &str) -> Result<String, ClassificationError> {
        let start = std::time::Instant::now();
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http_client
            .post(format!(
                "{}/models/{}:generateContent",
                self.endpoint, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                ClassificationError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Gemini API error");
            return Err(ClassificationError::Api(format!(
                "{}: {}",
                status,
                error_text.chars().take(300).collect::<String>()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Parse(e.to_string()))?;

        if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ClassificationError::Api(format!("prompt blocked: {}", reason)));
        }

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Gemini generateContent"
        );

        if text.trim().is_empty() {
            return Err(ClassificationError::Api("empty response".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, url: &Url, text: &str) -> Result<Verdict, ClassificationError> {
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            return Ok(Verdict::not_sensitive(TOO_SHORT));
        }

        let sample: String = text.chars().take(self.max_chars).collect();
        let answer = self.generate(&Self::build_prompt(url, &sample)).await?;
        parse_answer(&answer)
    }
}

/// Interprets the model's answer
///
/// A JSON object is preferred. Free text falls back to the first line: it
/// is sensitive if that line contains "yes", and the whole answer becomes
/// the rationale.
pub fn parse_answer(answer: &str) -> Result<Verdict, ClassificationError> {
    let trimmed = strip_fences(answer.trim());
    if trimmed.is_empty() {
        return Err(ClassificationError::Parse("empty answer".to_string()));
    }

    if let Ok(parsed) = serde_json::from_str::<ModelAnswer>(trimmed) {
        let severity = match (parsed.sensitive, parsed.severity.as_deref()) {
            (false, _) => Severity::None,
            (true, Some(s)) => match s.parse::<Severity>() {
                Ok(Severity::None) | Err(_) => Severity::Medium,
                Ok(level) => level,
            },
            (true, None) => Severity::Medium,
        };
        return Ok(Verdict {
            is_sensitive: parsed.sensitive,
            categories: parsed
                .categories
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            rationale: parsed.rationale.trim().to_string(),
            severity,
        });
    }

    let first_line = trimmed.lines().next().unwrap_or_default().to_ascii_lowercase();
    let is_sensitive = first_line.contains("yes");
    Ok(Verdict {
        is_sensitive,
        categories: Vec::new(),
        rationale: trimmed.to_string(),
        severity: if is_sensitive {
            Severity::Medium
        } else {
            Severity::None
        },
    })
}

fn strip_fences(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
struct ModelAnswer {
    #[serde(alias = "is_sensitive")]
    sensitive: bool,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default, alias = "explanation")]
    rationale: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> ClassifierConfig {
        ClassifierConfig {
            model: "test-model".to_string(),
            endpoint: endpoint.to_string(),
            max_chars: 50,
            ..ClassifierConfig::default()
        }
    }

    fn doc_url() -> Url {
        Url::parse("https://example.com/hr/salaries.xlsx").unwrap()
    }

    fn answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_parse_json_answer() {
        let verdict = parse_answer(
            r#"{"sensitive": true, "severity": "high", "categories": ["financial", " personal-info "], "rationale": "Lists salaries."}"#,
        )
        .unwrap();
        assert!(verdict.is_sensitive);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.categories, vec!["financial", "personal-info"]);
        assert_eq!(verdict.rationale, "Lists salaries.");
    }

    #[test]
    fn test_duplicate_categories_collapsed() {
        let verdict = parse_answer(
            r#"{"sensitive": true, "severity": "low", "categories": ["pii", "financial", " pii", "financial", ""], "rationale": "x"}"#,
        )
        .unwrap();
        assert_eq!(verdict.categories, vec!["financial", "pii"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let verdict = parse_answer("```json\n{\"sensitive\": false, \"rationale\": \"Press release\"}\n```").unwrap();
        assert!(!verdict.is_sensitive);
        assert_eq!(verdict.severity, Severity::None);
    }

    #[test]
    fn test_parse_free_text_first_line() {
        let verdict = parse_answer("1. Yes\n2. Contains account numbers").unwrap();
        assert!(verdict.is_sensitive);
        assert_eq!(verdict.severity, Severity::Medium);
        assert!(verdict.rationale.contains("account numbers"));

        let verdict = parse_answer("No.\nYes, it is a public brochure").unwrap();
        assert!(!verdict.is_sensitive);
    }

    #[test]
    fn test_sensitive_without_severity_is_medium() {
        let verdict = parse_answer(r#"{"sensitive": true, "severity": "none"}"#).unwrap();
        assert_eq!(verdict.severity, Severity::Medium);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_answer("   ").is_err());
    }

    #[tokio::test]
    async fn test_short_text_skips_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new("key", &config(&server.uri())).unwrap();
        let verdict = classifier.classify(&doc_url(), "  tiny  ").await.unwrap();

        assert!(!verdict.is_sensitive);
        assert_eq!(verdict.rationale, TOO_SHORT);
    }

    #[tokio::test]
    async fn test_classify_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer(
                r#"{"sensitive": true, "severity": "medium", "categories": ["personal-info"], "rationale": "Names and SSNs"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new("secret-key", &config(&server.uri())).unwrap();
        let text = "x".repeat(200);
        let verdict = classifier.classify(&doc_url(), &text).await.unwrap();

        assert!(verdict.is_sensitive);
        assert_eq!(verdict.categories, vec!["personal-info"]);

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let prompt = sent["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Document URL: https://example.com/hr/salaries.xlsx"));
        assert!(prompt.ends_with(&"x".repeat(50)));
        assert!(!prompt.contains(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn test_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new("key", &config(&server.uri())).unwrap();
        let err = classifier
            .classify(&doc_url(), "long enough document text")
            .await
            .unwrap_err();

        assert!(matches!(err, ClassificationError::Api(ref m) if m.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            )
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new("key", &config(&server.uri())).unwrap();
        let err = classifier
            .classify(&doc_url(), "long enough document text")
            .await
            .unwrap_err();

        assert_eq!(err, ClassificationError::Api("prompt blocked: SAFETY".to_string()));
    }

    #[test]
    fn test_from_env_missing_key() {
        let config = ClassifierConfig {
            api_key_env: "DOCSCOOP_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ClassifierConfig::default()
        };
        let err = GeminiClassifier::from_env(&config).err().unwrap();
        assert!(matches!(err, ClassificationError::Config(_)));
    }
}
