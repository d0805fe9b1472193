//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::JobStatus;
use crate::storage::{
    ArchivedResource, ExternalLink, JobNeighbors, JobRecord, NewJob, NewResource,
    ResourceRecord, SiteSummary,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All methods take `&self`: implementations synchronize internally so that
/// any number of crawl workers and replay requests can share one store
/// behind an `Arc<dyn ResourceStore>`.
pub trait ResourceStore: Send + Sync {
    // ===== Job Management =====

    /// Creates a new archive job in the `created` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn create_job(&self, job: &NewJob) -> StorageResult<i64>;

    /// Sets the status of a job
    ///
    /// Terminal states also record the finish timestamp.
    fn update_job_status(&self, job_id: i64, status: JobStatus) -> StorageResult<()>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>>;

    /// Lists the jobs of one host, newest first
    fn list_jobs_for_host(&self, host: &str) -> StorageResult<Vec<JobRecord>>;

    /// Lists every archived host with its latest job time and counts
    fn list_archived_sites(&self) -> StorageResult<Vec<SiteSummary>>;

    /// Finds the previous and next job of the same host
    fn adjacent_jobs(&self, job_id: i64) -> StorageResult<JobNeighbors>;

    /// Deletes a job together with its resources and external links
    ///
    /// Returns false if no such job existed.
    fn delete_job(&self, job_id: i64) -> StorageResult<bool>;

    // ===== Resource Management =====

    /// Inserts one resource row
    ///
    /// Fails with [`StorageError::ConstraintViolation`] if the job already
    /// has a row for the same link.
    ///
    /// # Returns
    ///
    /// The ID of the new resource row
    fn insert_resource(&self, resource: &NewResource) -> StorageResult<i64>;

    /// Gets a resource, body included, by job and normalized link
    fn get_resource(&self, job_id: i64, link: &str) -> StorageResult<Option<ArchivedResource>>;

    /// Lists the metadata of every resource of a job
    fn list_resources_by_job(&self, job_id: i64) -> StorageResult<Vec<ResourceRecord>>;

    // ===== External Links =====

    /// Records an out-of-host reference; repeated calls are ignored
    fn record_external_link(&self, job_id: i64, link: &str, referrer: &str)
        -> StorageResult<()>;

    /// Lists the external links recorded for a job
    fn list_external_links(&self, job_id: i64) -> StorageResult<Vec<ExternalLink>>;
}
