//! Archiver facade
//!
//! The entry point callers use: start an archive job for a seed URL, render
//! a stored resource, and find neighbouring jobs of the same host.

use crate::config::{validate_job_limits, Config};
use crate::crawler::{Coordinator, JobSettings, JobTarget};
use crate::replay::{RenderedResource, Replayer};
use crate::state::JobStatus;
use crate::storage::{JobNeighbors, NewJob, ResourceStore};
use crate::url::{host_key, normalize_url};
use crate::{ArchiveError, Result, UrlError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Starts jobs and serves stored snapshots from one store
pub struct Archiver {
    store: Arc<dyn ResourceStore>,
    config: Arc<Config>,
    replayer: Replayer,
}

impl Archiver {
    /// Creates an archiver
    ///
    /// # Arguments
    ///
    /// * `store` - The store jobs write to and replay reads from
    /// * `config` - Crawler and user agent settings applied to every job
    pub fn new(store: Arc<dyn ResourceStore>, config: Config) -> Self {
        Self {
            replayer: Replayer::new(Arc::clone(&store)),
            store,
            config: Arc::new(config),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Starts archiving a site
    ///
    /// The seed and limits are validated before any job row exists. The job
    /// then runs in the background on the current tokio runtime; this call
    /// returns as soon as the job row has been created.
    ///
    /// # Arguments
    ///
    /// * `seed` - Absolute http(s) URL the crawl starts from
    /// * `page_budget` - Maximum number of distinct URLs fetched
    /// * `worker_count` - Number of concurrent workers
    ///
    /// # Returns
    ///
    /// * `Ok(JobHandle)` - The job is running
    /// * `Err(ArchiveError)` - Invalid seed or limits, or the job row could not be created
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_archive(&self, seed: &str, page_budget: u32, worker_count: u32) -> Result<JobHandle> {
        let seed = normalize_url(seed.trim(), None)?;
        let host = host_key(&seed).ok_or_else(|| UrlError::MissingHost(seed.to_string()))?;
        validate_job_limits(page_budget, worker_count)?;

        let job_id = self.store.create_job(&NewJob {
            host: host.clone(),
            seed_url: seed.to_string(),
            page_budget,
            worker_count,
        })?;
        tracing::info!("Created job {} for {}", job_id, host);

        let settings = JobSettings::from_config(
            &self.config.crawler,
            &self.config.user_agent,
            page_budget,
            worker_count,
        );
        let cancel = CancellationToken::new();
        let coordinator = Coordinator::new(
            Arc::clone(&self.store),
            JobTarget { job_id, host, seed },
            settings,
            cancel.clone(),
        );

        Ok(JobHandle {
            job_id,
            cancel,
            task: tokio::spawn(coordinator.run()),
        })
    }

    /// Renders the resource a job stored for a URL
    pub fn render_archived_page(&self, job_id: i64, url: &str) -> Result<RenderedResource> {
        Ok(self.replayer.render(job_id, url)?)
    }

    /// Finds the previous and next job of the same host
    pub fn neighbors(&self, job_id: i64) -> Result<JobNeighbors> {
        Ok(self.store.adjacent_jobs(job_id)?)
    }
}

/// A running archive job
#[derive(Debug)]
pub struct JobHandle {
    job_id: i64,
    cancel: CancellationToken,
    task: JoinHandle<Result<JobStatus>>,
}

impl JobHandle {
    /// The id of the job row
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Asks the job to stop; it ends in the `failed` state
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this job, for use from another task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the job to reach a terminal state
    pub async fn wait(self) -> Result<JobStatus> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ArchiveError::Worker(e.to_string())),
        }
    }
}
