//! DocScoop: a document harvester for web domains
//!
//! This crate crawls a target host breadth-first, collects links to publicly
//! reachable documents, extracts their text and asks a classifier whether the
//! content looks sensitive. Network traffic can be routed through Tor, with the
//! circuit identity rotated when requests keep failing.

pub mod classify;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod harvest;
pub mod identity;
pub mod output;
pub mod state;
pub mod transport;
pub mod url;

use thiserror::Error;

/// Main error type for DocScoop operations
///
/// Only setup and output failures end up here. Per-document and per-page
/// failures are recorded in the harvest report instead.
#[derive(Debug, Error)]
pub enum ScoopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Anonymity overlay error: {0}")]
    Identity(#[from] identity::IdentityUnavailable),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Classifier error: {0}")]
    Classification(#[from] classify::ClassificationError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// URL-specific errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for DocScoop operations
pub type Result<T> = std::result::Result<T, ScoopError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classify::{Classifier, Verdict};
pub use config::Config;
pub use extract::Extractor;
pub use harvest::{DocumentOutcome, Finding, HarvestReport, Harvester};
pub use state::{DocumentState, PageState};
pub use url::{extension_of, normalize_url};
