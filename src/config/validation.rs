use crate::config::types::{
    AnonymityConfig, ClassifierConfig, Config, CrawlerConfig, DocumentsConfig, ExtractionConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_documents_config(&config.documents)?;
    validate_anonymity_config(&config.anonymity)?;
    validate_classifier_config(&config.classifier)?;
    validate_extraction_config(&config.extraction)?;
    Ok(())
}

/// Validates a seed URL and returns it parsed
///
/// The seed must be an absolute http(s) URL with a host.
pub fn validate_seed(seed: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(url)
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.page_timeout_secs == 0 || config.document_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request timeouts must be at least 1 second".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max-body-bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates include/exclude extension sets
fn validate_documents_config(config: &DocumentsConfig) -> Result<(), ConfigError> {
    if config.include.is_empty() {
        return Err(ConfigError::Validation(
            "documents.include must list at least one extension".to_string(),
        ));
    }

    for ext in config.include.iter().chain(config.exclude.iter()) {
        validate_extension(ext)?;
    }

    if let Some(ext) = config.include.intersection(&config.exclude).next() {
        return Err(ConfigError::Validation(format!(
            "extension '{}' is both included and excluded",
            ext
        )));
    }

    Ok(())
}

/// Validates a single extension: lowercase alphanumerics, no leading dot
fn validate_extension(ext: &str) -> Result<(), ConfigError> {
    if ext.is_empty() || ext.len() > 10 {
        return Err(ConfigError::InvalidExtension(format!(
            "'{}' must be 1-10 characters",
            ext
        )));
    }

    if !ext
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(ConfigError::InvalidExtension(format!(
            "'{}' must be lowercase alphanumeric without a dot",
            ext
        )));
    }

    Ok(())
}

/// Validates the Tor settings
fn validate_anonymity_config(config: &AnonymityConfig) -> Result<(), ConfigError> {
    validate_endpoint(&config.socks_endpoint)?;
    validate_endpoint(&config.control_endpoint)?;

    if config.launch && config.tor_binary.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tor-binary cannot be empty when launch is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates a host:port endpoint
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidEndpoint(format!("'{}' is not host:port", endpoint)))?;

    if host.is_empty() {
        return Err(ConfigError::InvalidEndpoint(format!(
            "'{}' has an empty host",
            endpoint
        )));
    }

    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint(format!(
            "'{}' has an invalid port",
            endpoint
        ))),
    }
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "classifier.model cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid classifier endpoint: {}", e)))?;

    if config.max_chars == 0 {
        return Err(ConfigError::Validation(
            "classifier.max-chars must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.max_part_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-part-bytes must be greater than 0".to_string(),
        ));
    }
    for (ext, argv) in &config.commands {
        validate_extension(ext)?;
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "extraction command for '{}' is empty",
                ext
            )));
        }
    }
    Ok(())
}
