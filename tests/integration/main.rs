//! Integration tests for DocScoop
//!
//! These tests use wiremock to serve fixture sites and run the full
//! fetch, extract and classify pipeline end to end.

mod common;
mod harvest_tests;
mod output_tests;
