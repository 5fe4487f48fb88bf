//! Configuration module for DocScoop
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; command-line flags are applied on top of the file.
//!
//! # Example
//!
//! ```no_run
//! use docscoop::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docscoop.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    clean_extension, AnonymityConfig, ClassifierConfig, Config, CrawlerConfig, DocumentsConfig,
    ExtractionConfig, OutputConfig, DEFAULT_EXCLUDE, DEFAULT_INCLUDE,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, validate_seed};
