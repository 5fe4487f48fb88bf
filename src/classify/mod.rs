//! Content-sensitivity classification
//!
//! The orchestrator only knows the [`Classifier`] trait. The CLI wires in
//! [`GeminiClassifier`]; tests use stubs.

mod gemini;

pub use gemini::{parse_answer, GeminiClassifier, MIN_TEXT_CHARS};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Classifier failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// Missing API key or unusable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx answer, quota, blocked prompt
    #[error("API error: {0}")]
    Api(String),

    /// The answer could not be understood
    #[error("Parse error: {0}")]
    Parse(String),
}

/// How bad a sensitive document is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" | "critical" => Ok(Self::High),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Classifier output for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_sensitive: bool,
    pub categories: Vec<String>,
    pub rationale: String,
    pub severity: Severity,
}

impl Verdict {
    pub fn not_sensitive(rationale: impl Into<String>) -> Self {
        Self {
            is_sensitive: false,
            categories: Vec::new(),
            rationale: rationale.into(),
            severity: Severity::None,
        }
    }
}

/// Decides whether extracted text looks sensitive
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, url: &Url, text: &str) -> Result<Verdict, ClassificationError>;
}
