//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Rewind database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One crawl run against one host
CREATE TABLE IF NOT EXISTS archive_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host TEXT NOT NULL,
    seed_url TEXT NOT NULL,
    time_started TEXT NOT NULL,
    time_finished TEXT,
    page_budget INTEGER NOT NULL CHECK (page_budget >= 1),
    worker_count INTEGER NOT NULL CHECK (worker_count >= 1),
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_archive_jobs_host ON archive_jobs(host);

-- Every fetch attempt of a job, successful or not
CREATE TABLE IF NOT EXISTS archived_resource (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    link TEXT NOT NULL,
    host TEXT NOT NULL,
    type TEXT NOT NULL,
    status_code INTEGER,
    content_type TEXT,
    content BLOB,
    content_length INTEGER NOT NULL DEFAULT 0,
    truncated INTEGER NOT NULL DEFAULT 0,
    failure TEXT,
    fetched_at TEXT NOT NULL,
    scraping_job INTEGER NOT NULL REFERENCES archive_jobs(id) ON DELETE CASCADE,
    UNIQUE(scraping_job, link)
);

CREATE INDEX IF NOT EXISTS idx_archived_resource_job ON archived_resource(scraping_job);

-- Out-of-host references, recorded but never fetched
CREATE TABLE IF NOT EXISTS external_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scraping_job INTEGER NOT NULL REFERENCES archive_jobs(id) ON DELETE CASCADE,
    link TEXT NOT NULL,
    referrer TEXT NOT NULL,
    UNIQUE(scraping_job, link, referrer)
);

CREATE INDEX IF NOT EXISTS idx_external_links_job ON external_links(scraping_job);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
