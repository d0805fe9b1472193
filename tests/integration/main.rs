//! Integration tests for Rewind
//!
//! These tests run real archive jobs against wiremock servers and replay
//! the stored results from a temporary SQLite database.

mod common;
mod crawl_tests;
mod replay_tests;
