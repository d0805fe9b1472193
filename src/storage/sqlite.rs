//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ResourceStore trait.

use crate::state::{JobStatus, ResourceKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ResourceStore, StorageError, StorageResult};
use crate::storage::{
    ArchivedResource, ExternalLink, JobNeighbors, JobRecord, NewJob, NewResource,
    ResourceRecord, SiteSummary,
};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const JOB_COLUMNS: &str = "j.id, j.host, j.seed_url, j.time_started, j.time_finished,
     j.page_budget, j.worker_count, j.status,
     (SELECT COUNT(*) FROM archived_resource r WHERE r.scraping_job = j.id)";

const RESOURCE_COLUMNS: &str = "id, scraping_job, link, host, type, status_code, content_type,
     content_length, truncated, failure, fetched_at";

/// SQLite storage backend
///
/// The connection sits behind a mutex so the store can be shared by all
/// workers of all running jobs.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<(JobRecord, String)> {
    let status: String = row.get(7)?;
    let page_count: i64 = row.get(8)?;
    Ok((
        JobRecord {
            id: row.get(0)?,
            host: row.get(1)?,
            seed_url: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            page_budget: row.get(5)?,
            worker_count: row.get(6)?,
            status: JobStatus::Created,
            page_count: page_count as u64,
        },
        status,
    ))
}

fn finish_job(raw: (JobRecord, String)) -> StorageResult<JobRecord> {
    let (mut job, status) = raw;
    job.status = JobStatus::from_db_string(&status).ok_or_else(|| {
        StorageError::Corrupt(format!("job {} has unknown status '{}'", job.id, status))
    })?;
    Ok(job)
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<(ResourceRecord, String)> {
    let kind: String = row.get(4)?;
    let content_length: i64 = row.get(7)?;
    Ok((
        ResourceRecord {
            id: row.get(0)?,
            job_id: row.get(1)?,
            link: row.get(2)?,
            host: row.get(3)?,
            kind: ResourceKind::Other,
            status_code: row.get(5)?,
            content_type: row.get(6)?,
            content_length: content_length as u64,
            truncated: row.get(8)?,
            failure: row.get(9)?,
            fetched_at: row.get(10)?,
        },
        kind,
    ))
}

fn finish_resource(raw: (ResourceRecord, String)) -> StorageResult<ResourceRecord> {
    let (mut record, kind) = raw;
    record.kind = ResourceKind::from_db_string(&kind).ok_or_else(|| {
        StorageError::Corrupt(format!("resource {} has unknown type '{}'", record.id, kind))
    })?;
    Ok(record)
}

impl ResourceStore for SqliteStorage {
    // ===== Job Management =====

    fn create_job(&self, job: &NewJob) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO archive_jobs (host, seed_url, time_started, page_budget, worker_count, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.host,
                job.seed_url,
                now,
                job.page_budget,
                job.worker_count,
                JobStatus::Created.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_job_status(&self, job_id: i64, status: JobStatus) -> StorageResult<()> {
        let conn = self.conn()?;
        let finished = status.is_terminal().then(|| Utc::now().to_rfc3339());
        let updated = conn.execute(
            "UPDATE archive_jobs SET status = ?1, time_finished = COALESCE(?2, time_finished)
             WHERE id = ?3",
            params![status.to_db_string(), finished, job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM archive_jobs j WHERE j.id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?;

        raw.map(finish_job).transpose()
    }

    fn list_jobs_for_host(&self, host: &str) -> StorageResult<Vec<JobRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM archive_jobs j WHERE j.host = ?1 ORDER BY j.id DESC",
            JOB_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![host], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(finish_job).collect()
    }

    fn list_archived_sites(&self) -> StorageResult<Vec<SiteSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT j.host,
                    MAX(j.time_started),
                    (SELECT COUNT(*) FROM archived_resource r
                       JOIN archive_jobs j2 ON r.scraping_job = j2.id
                      WHERE j2.host = j.host),
                    COUNT(*)
             FROM archive_jobs j
             GROUP BY j.host
             ORDER BY MAX(j.time_started) DESC",
        )?;

        let sites = stmt
            .query_map([], |row| {
                Ok(SiteSummary {
                    host: row.get(0)?,
                    latest_job_time: row.get(1)?,
                    page_count: row.get::<_, i64>(2)? as u64,
                    job_count: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    fn adjacent_jobs(&self, job_id: i64) -> StorageResult<JobNeighbors> {
        let conn = self.conn()?;
        let host: String = conn
            .query_row(
                "SELECT host FROM archive_jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))?;

        let older: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM archive_jobs WHERE host = ?1 AND id < ?2",
            params![host, job_id],
            |row| row.get(0),
        )?;
        let newer: Option<i64> = conn.query_row(
            "SELECT MIN(id) FROM archive_jobs WHERE host = ?1 AND id > ?2",
            params![host, job_id],
            |row| row.get(0),
        )?;

        Ok(JobNeighbors { older, newer })
    }

    fn delete_job(&self, job_id: i64) -> StorageResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM archive_jobs WHERE id = ?1", params![job_id])?;
        Ok(deleted > 0)
    }

    // ===== Resource Management =====

    fn insert_resource(&self, resource: &NewResource) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO archived_resource
             (link, host, type, status_code, content_type, content, content_length,
              truncated, failure, fetched_at, scraping_job)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                resource.link,
                resource.host,
                resource.kind.to_db_string(),
                resource.status_code,
                resource.content_type,
                resource.content,
                resource.content_length as i64,
                resource.truncated,
                resource.failure,
                now,
                resource.job_id
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "resource {} in job {}: {}",
                    resource.link,
                    resource.job_id,
                    message.unwrap_or_else(|| "constraint failed".to_string())
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_resource(&self, job_id: i64, link: &str) -> StorageResult<Option<ArchivedResource>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {}, content FROM archived_resource
                     WHERE scraping_job = ?1 AND link = ?2",
                    RESOURCE_COLUMNS
                ),
                params![job_id, link],
                |row| {
                    let content: Option<Vec<u8>> = row.get(11)?;
                    Ok((resource_from_row(row)?, content))
                },
            )
            .optional()?;

        match raw {
            Some((record, content)) => Ok(Some(ArchivedResource {
                record: finish_resource(record)?,
                content,
            })),
            None => Ok(None),
        }
    }

    fn list_resources_by_job(&self, job_id: i64) -> StorageResult<Vec<ResourceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM archived_resource WHERE scraping_job = ?1 ORDER BY id",
            RESOURCE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![job_id], resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(finish_resource).collect()
    }

    // ===== External Links =====

    fn record_external_link(
        &self,
        job_id: i64,
        link: &str,
        referrer: &str,
    ) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO external_links (scraping_job, link, referrer) VALUES (?1, ?2, ?3)",
            params![job_id, link, referrer],
        )?;
        Ok(())
    }

    fn list_external_links(&self, job_id: i64) -> StorageResult<Vec<ExternalLink>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT scraping_job, link, referrer FROM external_links
             WHERE scraping_job = ?1 ORDER BY link, referrer",
        )?;

        let links = stmt
            .query_map(params![job_id], |row| {
                Ok(ExternalLink {
                    job_id: row.get(0)?,
                    link: row.get(1)?,
                    referrer: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }
}
