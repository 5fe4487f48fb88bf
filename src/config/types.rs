use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Extensions harvested as documents unless configured otherwise
pub const DEFAULT_INCLUDE: &[&str] = &["pdf", "txt", "doc", "docx", "rtf", "csv", "xls", "xlsx"];

/// Extensions skipped during discovery unless configured otherwise
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "mp4", "avi", "mov",
];

/// Main configuration structure for DocScoop
///
/// Every section and field has a default, so an empty file (or no file at
/// all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub documents: DocumentsConfig,
    pub anonymity: AnonymityConfig,
    pub classifier: ClassifierConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URL (the seed is depth 0)
    pub max_depth: u32,

    /// Number of page/document tasks in flight at once
    pub concurrency: u32,

    /// Per-request timeout for HTML pages (seconds)
    pub page_timeout_secs: u64,

    /// Per-request timeout for document downloads (seconds)
    pub document_timeout_secs: u64,

    /// Attempts per fetch before the error is surfaced
    pub max_retries: u32,

    /// Delay before the second attempt (milliseconds)
    pub retry_backoff_ms: u64,

    /// Upper bound on page fetches in one run
    pub max_pages: Option<u32>,

    /// Wall-clock budget after which no new pages are crawled (seconds)
    pub max_duration_secs: Option<u64>,

    /// Largest response body accepted (bytes)
    pub max_body_bytes: u64,

    /// User agent for direct (non-anonymous) requests
    pub user_agent: String,

    /// Harvest document links that point at other hosts; when off they are
    /// listed in the report instead
    pub allow_offsite_documents: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            concurrency: 5,
            page_timeout_secs: 10,
            document_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 2_000,
            max_pages: None,
            max_duration_secs: None,
            max_body_bytes: 25 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            allow_offsite_documents: true,
        }
    }
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

/// Which file extensions count as documents
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Extensions treated as documents (lowercase, no dot)
    pub include: BTreeSet<String>,

    /// Extensions never fetched, neither as pages nor documents
    pub exclude: BTreeSet<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DocumentsConfig {
    /// Adds extensions to the include set (and removes them from the exclude set)
    pub fn include_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = clean_extension(ext.as_ref());
            if ext.is_empty() {
                continue;
            }
            self.exclude.remove(&ext);
            self.include.insert(ext);
        }
    }

    /// Moves extensions from the include set to the exclude set
    pub fn exclude_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = clean_extension(ext.as_ref());
            if ext.is_empty() {
                continue;
            }
            self.include.remove(&ext);
            self.exclude.insert(ext);
        }
    }
}

/// Lowercases an extension and strips a leading dot
pub fn clean_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Tor anonymity overlay settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnonymityConfig {
    /// Route every request through Tor
    pub enabled: bool,

    /// Tor SOCKS listener (host:port)
    pub socks_endpoint: String,

    /// Tor control port (host:port)
    pub control_endpoint: String,

    /// Control port password; cookie or null auth is used when absent
    pub control_password: Option<String>,

    /// Spawn a private tor process instead of using a running one
    pub launch: bool,

    /// Tor executable used when `launch` is set
    pub tor_binary: String,

    /// Data directory for a launched tor process (defaults to ~/.docscoop/tor_data)
    pub data_directory: Option<PathBuf>,

    /// How long to wait after NEWNYM before using the new identity (milliseconds)
    pub newnym_settle_ms: u64,

    /// How long a launched tor process may take to bootstrap (seconds)
    pub bootstrap_timeout_secs: u64,
}

impl Default for AnonymityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socks_endpoint: "127.0.0.1:9050".to_string(),
            control_endpoint: "127.0.0.1:9051".to_string(),
            control_password: None,
            launch: false,
            tor_binary: "tor".to_string(),
            data_directory: None,
            newnym_settle_ms: 5_000,
            bootstrap_timeout_secs: 120,
        }
    }
}

impl AnonymityConfig {
    pub fn newnym_settle(&self) -> Duration {
        Duration::from_millis(self.newnym_settle_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    /// Data directory for a launched tor, falling back to `~/.docscoop/tor_data`
    pub fn resolved_data_directory(&self) -> Option<PathBuf> {
        self.data_directory.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".docscoop").join("tor_data"))
        })
    }
}

/// Sensitivity classifier settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Gemini model name
    pub model: String,

    /// Base URL of the Generative Language API
    pub endpoint: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Characters of document text sent to the model
    pub max_chars: usize,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_chars: 10_000,
            timeout_secs: 60,
        }
    }
}

/// Text extraction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// External converters keyed by extension; the document is piped to stdin
    /// and the text is read from stdout
    pub commands: BTreeMap<String, Vec<String>>,

    /// Time limit for an external converter (seconds)
    pub timeout_secs: u64,

    /// Largest decompressed archive part or converter output accepted (bytes)
    pub max_part_bytes: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert(
            "pdf".to_string(),
            vec!["pdftotext", "-q", "-", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        Self {
            commands,
            timeout_secs: 60,
            max_part_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// CSV file receiving one row per document
    pub csv_path: Option<PathBuf>,

    /// Markdown summary file
    pub summary_path: Option<PathBuf>,

    /// SQLite database recording runs and documents
    pub database_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_moves_out_of_exclude() {
        let mut docs = DocumentsConfig::default();
        docs.include_extensions([".MP4"]);
        assert!(docs.include.contains("mp4"));
        assert!(!docs.exclude.contains("mp4"));
    }

    #[test]
    fn test_exclude_moves_out_of_include() {
        let mut docs = DocumentsConfig::default();
        docs.exclude_extensions(["pdf", " "]);
        assert!(!docs.include.contains("pdf"));
        assert!(docs.exclude.contains("pdf"));
        assert!(!docs.exclude.contains(""));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.documents.include.len(), 8);
        assert!(!config.anonymity.enabled);
        assert!(config.crawler.allow_offsite_documents);
        assert!(config.extraction.commands.contains_key("pdf"));
        assert_eq!(config.extraction.max_part_bytes, 64 * 1024 * 1024);
    }
}
