//! State module for tracking task progress
//!
//! # Components
//!
//! - `PageState`: lifecycle of a crawled page (queued, fetching, expanded, ...)
//! - `DocumentState`: lifecycle of a harvested document (fetching, extracted, reported, ...)

mod task_state;

pub use task_state::{DocumentState, PageState};
