//! Storage module for persisting archive jobs and their resources
//!
//! This module defines the [`ResourceStore`] boundary the crawler and the
//! replay layer talk to, and ships a SQLite implementation of it:
//! - Job creation and status tracking
//! - Append-only resource rows, unique per (job, link)
//! - External (out-of-host) link recording
//! - Listing queries for archived sites and cross-job navigation

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ResourceStore, StorageError, StorageResult};

use crate::state::{JobStatus, ResourceKind};

use std::path::Path;

/// Opens (or creates) a SQLite store at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Parameters of a job about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub host: String,
    pub seed_url: String,
    pub page_budget: u32,
    pub worker_count: u32,
}

/// Represents an archive job in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: i64,
    pub host: String,
    pub seed_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub page_budget: u32,
    pub worker_count: u32,
    pub status: JobStatus,
    /// Number of resource rows stored for this job
    pub page_count: u64,
}

/// A resource row about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResource {
    pub job_id: i64,
    pub link: String,
    pub host: String,
    pub kind: ResourceKind,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content: Option<Vec<u8>>,
    pub content_length: u64,
    pub truncated: bool,
    pub failure: Option<String>,
}

/// Resource metadata without its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub id: i64,
    pub job_id: i64,
    pub link: String,
    pub host: String,
    pub kind: ResourceKind,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub truncated: bool,
    pub failure: Option<String>,
    pub fetched_at: String,
}

impl ResourceRecord {
    /// Returns true if the fetch produced a stored body
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// A stored resource including its raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedResource {
    pub record: ResourceRecord,
    pub content: Option<Vec<u8>>,
}

/// An out-of-host reference discovered during a job and never fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub job_id: i64,
    pub link: String,
    pub referrer: String,
}

/// One archived host with aggregate counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSummary {
    pub host: String,
    pub latest_job_time: String,
    pub page_count: u64,
    pub job_count: u64,
}

/// The jobs immediately before and after a job of the same host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobNeighbors {
    pub older: Option<i64>,
    pub newer: Option<i64>,
}
