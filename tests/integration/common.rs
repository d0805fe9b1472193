//! Shared helpers for the integration tests

use rewind::config::Config;
use rewind::storage::SqliteStorage;
use rewind::{Archiver, ResourceStore};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::ResponseTemplate;

/// An archiver over a fresh on-disk database
pub struct TestArchive {
    pub archiver: Archiver,
    pub store: Arc<dyn ResourceStore>,
    _dir: TempDir,
}

/// Creates a test configuration that never sleeps between requests
pub fn create_test_config(db_path: &str) -> Config {
    let mut config = Config::default();
    config.crawler.politeness_delay_ms = 0;
    config.crawler.max_retries = 0;
    config.crawler.retry_backoff_ms = 1;
    config.crawler.request_timeout_ms = 5_000;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.database_path = db_path.to_string();
    config
}

pub fn test_archive() -> TestArchive {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("rewind.db");
    let store: Arc<dyn ResourceStore> =
        Arc::new(SqliteStorage::new(&db_path).expect("Failed to open database"));
    let config = create_test_config(&db_path.to_string_lossy());

    TestArchive {
        archiver: Archiver::new(Arc::clone(&store), config),
        store,
        _dir: dir,
    }
}

/// A 200 response carrying an HTML body
///
/// `set_body_string` forces `text/plain`, so the mime goes through
/// `set_body_raw`.
pub fn html(body: impl Into<String>) -> ResponseTemplate {
    let body: String = body.into();
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}
