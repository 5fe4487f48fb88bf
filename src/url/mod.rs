//! URL handling module for DocScoop
//!
//! This module provides URL normalization, extension extraction and the
//! host-scope check used by the crawl scheduler.

mod domain;
mod normalize;

pub use domain::{extract_host, in_scope};
pub use normalize::{extension_of, normalize_parsed, normalize_url};
