//! Statistics generation for archive jobs
//!
//! This module provides functionality for extracting and displaying the
//! statistics of one stored job.

use crate::state::{JobStatus, ResourceKind};
use crate::storage::{ResourceRecord, ResourceStore, StorageError};
use crate::Result;
use std::collections::BTreeMap;

/// Statistics summary of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatistics {
    pub job_id: i64,
    pub host: String,
    pub seed_url: String,
    pub status: JobStatus,
    pub started_at: String,
    pub finished_at: Option<String>,

    /// Duration in seconds, if the job has finished
    pub duration_seconds: Option<u64>,

    /// Total number of resource rows
    pub total_resources: u64,

    /// Count of stored resources by kind
    pub resources_by_kind: BTreeMap<ResourceKind, u64>,

    /// Count of failed fetches by status code (`None` for transport failures)
    pub failures_by_status: BTreeMap<Option<u16>, u64>,

    /// Number of bodies cut at the size cap
    pub truncated: u64,

    /// Total bytes of stored bodies
    pub total_bytes: u64,

    /// Number of distinct out-of-host links
    pub external_links: u64,
}

impl JobStatistics {
    /// Number of resources fetched without failure
    pub fn successes(&self) -> u64 {
        self.total_resources - self.failures()
    }

    /// Number of failed fetches
    pub fn failures(&self) -> u64 {
        self.failures_by_status.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `job_id` - The job to summarize
///
/// # Returns
///
/// * `Ok(JobStatistics)` - Successfully loaded statistics
/// * `Err(ArchiveError)` - The job does not exist or the query failed
pub fn load_statistics(storage: &dyn ResourceStore, job_id: i64) -> Result<JobStatistics> {
    let job = storage
        .get_job(job_id)?
        .ok_or(StorageError::JobNotFound(job_id))?;
    let resources = storage.list_resources_by_job(job_id)?;
    let external: std::collections::BTreeSet<String> = storage
        .list_external_links(job_id)?
        .into_iter()
        .map(|link| link.link)
        .collect();

    let duration_seconds = job.finished_at.as_deref().and_then(|finished| {
        let started = chrono::DateTime::parse_from_rfc3339(&job.started_at).ok()?;
        let finished = chrono::DateTime::parse_from_rfc3339(finished).ok()?;
        u64::try_from((finished - started).num_seconds()).ok()
    });

    let (resources_by_kind, failures_by_status, truncated, total_bytes) = tally(&resources);

    Ok(JobStatistics {
        job_id: job.id,
        host: job.host,
        seed_url: job.seed_url,
        status: job.status,
        started_at: job.started_at,
        finished_at: job.finished_at,
        duration_seconds,
        total_resources: resources.len() as u64,
        resources_by_kind,
        failures_by_status,
        truncated,
        total_bytes,
        external_links: external.len() as u64,
    })
}

type Tally = (
    BTreeMap<ResourceKind, u64>,
    BTreeMap<Option<u16>, u64>,
    u64,
    u64,
);

fn tally(resources: &[ResourceRecord]) -> Tally {
    let mut by_kind = BTreeMap::new();
    let mut failures = BTreeMap::new();
    let mut truncated = 0;
    let mut bytes = 0;

    for resource in resources {
        if resource.is_success() {
            *by_kind.entry(resource.kind).or_insert(0) += 1;
            bytes += resource.content_length;
        } else {
            *failures.entry(resource.status_code).or_insert(0) += 1;
        }
        if resource.truncated {
            truncated += 1;
        }
    }

    (by_kind, failures, truncated, bytes)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &JobStatistics) {
    println!("=== Job {} Statistics ===\n", stats.job_id);

    println!("Overview:");
    println!("  Host: {}", stats.host);
    println!("  Seed: {}", stats.seed_url);
    println!("  Status: {}", stats.status);
    println!("  Started: {}", stats.started_at);
    if let Some(finished) = &stats.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(duration) = stats.duration_seconds {
        println!("  Duration: {}s", duration);
    }
    println!("  Resources: {}", stats.total_resources);
    println!("  Stored bytes: {}", stats.total_bytes);
    println!("  External links: {}", stats.external_links);
    println!();

    println!("Resources by Kind:");
    for kind in ResourceKind::ALL {
        let count = stats.resources_by_kind.get(&kind).copied().unwrap_or(0);
        if count > 0 {
            let percentage = (count as f64 / stats.total_resources as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", kind, count, percentage);
        }
    }
    println!();

    if !stats.failures_by_status.is_empty() {
        println!("Failures:");
        for (status, count) in &stats.failures_by_status {
            match status {
                Some(code) => println!("  HTTP {}: {}", code, count),
                None => println!("  No response: {}", count),
            }
        }
        println!();
    }

    if stats.truncated > 0 {
        println!("Truncated bodies: {}\n", stats.truncated);
    }

    let success_rate = if stats.total_resources > 0 {
        (stats.successes() as f64 / stats.total_resources as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} resources stored)",
        success_rate,
        stats.successes(),
        stats.total_resources
    );
}
