//! Integration tests for sitemeter
//!
//! These tests use wiremock to stand up mock sites and a mock
//! chat-completions API and drive the public crate API end-to-end.

mod auth_tests;
mod common;
mod crawl_tests;
mod evaluation_tests;
