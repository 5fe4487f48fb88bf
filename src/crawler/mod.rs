//! Crawler module for page discovery and document recognition
//!
//! This module contains the crawl-side logic, including:
//! - HTML parsing and page/document link extraction
//! - Document-type discrimination by extension, content type and magic bytes
//! - The FIFO frontier with its visited sets, depth bound and host scope
//!
//! Fetching and task orchestration live in `transport` and `harvest`.

mod discover;
mod doctype;
mod scheduler;

pub use discover::{discover, Discovered};
pub use doctype::{
    is_html_response, sniff, DocumentKind, DocumentRules, LinkKind, Magic, IMAGE_EXTENSIONS,
};
pub use scheduler::{CrawlScheduler, CrawlTask, EnqueueOutcome, FrontierEmpty};
