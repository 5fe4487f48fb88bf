//! Text extraction from harvested documents
//!
//! # Components
//!
//! - `Extractor`: the collaborator trait the orchestrator calls
//! - `BuiltinExtractor`: plain text, CSV, RTF and Office Open XML in-process;
//!   anything else through an external command fed on stdin
//! - `ooxml`: text from `.docx` and `.xlsx` packages
//! - `rtf`: RTF control-word stripping

mod builtin;
mod ooxml;
mod rtf;

pub use builtin::BuiltinExtractor;
pub use ooxml::{docx_text, xlsx_text};
pub use rtf::strip_rtf;

use crate::crawler::DocumentKind;
use async_trait::async_trait;
use thiserror::Error;

/// Why a document produced no text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no extractor for .{0} documents")]
    Unsupported(String),

    #[error("corrupt {kind} document: {message}")]
    Corrupt { kind: String, message: String },

    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractionError {
    pub(crate) fn corrupt(kind: &DocumentKind, message: impl ToString) -> Self {
        Self::Corrupt {
            kind: kind.extension().to_string(),
            message: message.to_string(),
        }
    }
}

/// Turns document bytes into plain text
///
/// The bytes are moved in so they are released as soon as extraction ends.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>, hint: &DocumentKind) -> Result<String, ExtractionError>;
}
