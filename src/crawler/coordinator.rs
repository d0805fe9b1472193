//! Job coordinator - runs one archive job to a terminal state
//!
//! This module contains the worker pool of a job. It:
//! - Moves the job row through `created → running → completed | failed`
//! - Seeds the frontier with the seed URL
//! - Spawns a fixed number of workers that drain the frontier
//! - Persists one resource row for every URL a worker attempted
//! - Records out-of-host references as external links
//! - Stops early on cancellation or on a storage failure

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::fetcher::{
    build_http_client, fetch, FetchFailure, FetchPolicy, FetchedResource,
};
use crate::crawler::frontier::{Frontier, FrontierEntry, PushOutcome};
use crate::crawler::parser::extract;
use crate::state::{JobStatus, ResourceKind};
use crate::storage::{NewResource, ResourceStore};
use crate::url::resolve;
use crate::{ArchiveError, UrlError};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Progress is logged every this many stored resources
const PROGRESS_INTERVAL: u64 = 10;

/// Limits and HTTP settings of one job
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub page_budget: u32,
    pub worker_count: u32,
    pub fetch_policy: FetchPolicy,
    pub politeness_delay: Duration,
    pub user_agent: String,
}

impl JobSettings {
    /// Builds job settings from configuration plus the per-job limits
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        page_budget: u32,
        worker_count: u32,
    ) -> Self {
        Self {
            page_budget,
            worker_count,
            fetch_policy: FetchPolicy::from_config(crawler),
            politeness_delay: crawler.politeness_delay(),
            user_agent: user_agent.header_value(),
        }
    }
}

/// Identity of the job being run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    pub job_id: i64,
    /// Host key every fetched URL must match
    pub host: String,
    /// Normalized seed URL
    pub seed: Url,
}

/// Runs one archive job
pub struct Coordinator {
    store: Arc<dyn ResourceStore>,
    target: JobTarget,
    settings: JobSettings,
    cancel: CancellationToken,
    status: JobStatus,
}

impl Coordinator {
    /// Creates a coordinator for a job row that is still in the `created` state
    ///
    /// # Arguments
    ///
    /// * `store` - The resource store shared with the rest of the archiver
    /// * `target` - The job row's id, host and seed
    /// * `settings` - Budget, worker count and fetch policy
    /// * `cancel` - Token that aborts the job when cancelled
    pub fn new(
        store: Arc<dyn ResourceStore>,
        target: JobTarget,
        settings: JobSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            target,
            settings,
            cancel,
            status: JobStatus::Created,
        }
    }

    /// Runs the job until the frontier is exhausted, the job is cancelled or
    /// storage fails
    ///
    /// Individual fetch failures never fail the job; they are stored as
    /// resource rows without content.
    ///
    /// # Returns
    ///
    /// * `Ok(JobStatus)` - The terminal status written to the job row
    /// * `Err(ArchiveError)` - The job row itself could not be updated
    pub async fn run(mut self) -> Result<JobStatus, ArchiveError> {
        let job_id = self.target.job_id;
        self.transition(JobStatus::Running)?;
        tracing::info!(
            "Job {} started: {} (budget {}, {} workers)",
            job_id,
            self.target.seed,
            self.settings.page_budget,
            self.settings.worker_count
        );

        let start_time = Instant::now();
        let outcome = self.run_workers().await;

        let final_status = match &outcome {
            Ok(()) if self.cancel.is_cancelled() => {
                tracing::warn!("Job {} cancelled", job_id);
                JobStatus::Failed
            }
            Ok(()) => JobStatus::Completed,
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                JobStatus::Failed
            }
        };

        self.transition(final_status)?;
        tracing::info!(
            "Job {} {} after {:.1}s",
            job_id,
            final_status,
            start_time.elapsed().as_secs_f64()
        );

        Ok(final_status)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), ArchiveError> {
        if !self.status.can_transition_to(next) {
            return Err(ArchiveError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.store.update_job_status(self.target.job_id, next)?;
        self.status = next;
        Ok(())
    }

    async fn run_workers(&self) -> Result<(), ArchiveError> {
        let client = build_http_client(&self.settings.user_agent, &self.target.host)?;

        let frontier = Arc::new(Frontier::new(self.settings.page_budget));
        frontier.push(self.target.seed.as_str(), 0);

        let context = Arc::new(WorkerContext {
            job_id: self.target.job_id,
            host: self.target.host.clone(),
            store: Arc::clone(&self.store),
            frontier: Arc::clone(&frontier),
            client,
            settings: self.settings.clone(),
            cancel: self.cancel.clone(),
            stored: AtomicU64::new(0),
            start_time: Instant::now(),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.worker_count {
            let context = Arc::clone(&context);
            workers.spawn(async move { context.work(worker_id).await });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(ArchiveError::Worker(e.to_string())),
            };
            if let Err(e) = result {
                frontier.close();
                first_error.get_or_insert(e);
            }
        }

        tracing::debug!(
            "Job {} workers finished: {} admitted, {} stored",
            self.target.job_id,
            frontier.admitted(),
            context.stored.load(Ordering::Relaxed)
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// State shared by the workers of one job
struct WorkerContext {
    job_id: i64,
    host: String,
    store: Arc<dyn ResourceStore>,
    frontier: Arc<Frontier>,
    client: Client,
    settings: JobSettings,
    cancel: CancellationToken,
    stored: AtomicU64,
    start_time: Instant,
}

impl WorkerContext {
    async fn work(&self, worker_id: u32) -> Result<(), ArchiveError> {
        tracing::trace!("Job {} worker {} started", self.job_id, worker_id);

        loop {
            let entry = tokio::select! {
                _ = self.cancel.cancelled() => break,
                entry = self.frontier.pop() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };

            let result = self.process(&entry).await;
            self.frontier.complete();

            if let Err(e) = result {
                tracing::error!("Job {} worker stopped on {}: {}", self.job_id, entry.url, e);
                self.frontier.close();
                return Err(e);
            }
        }

        tracing::trace!("Job {} worker {} finished", self.job_id, worker_id);
        Ok(())
    }

    /// Fetches one entry and stores its row
    async fn process(&self, entry: &FrontierEntry) -> Result<(), ArchiveError> {
        let url = Url::parse(&entry.url).map_err(|e| UrlError::Malformed {
            input: entry.url.clone(),
            reason: e.to_string(),
        })?;

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!("Abandoning {} after cancellation", entry.url);
                return Ok(());
            }
            result = self.polite_fetch(&url) => result,
        };

        let resource = match fetched {
            Ok(fetched) => self.handle_success(entry, fetched)?,
            Err(failure) => {
                tracing::warn!("Failed to fetch {}: {}", entry.url, failure.reason);
                NewResource {
                    job_id: self.job_id,
                    link: entry.url.clone(),
                    host: self.host.clone(),
                    kind: ResourceKind::classify(failure.content_type.as_deref()),
                    status_code: failure.status_code,
                    content_type: failure.content_type,
                    content: None,
                    content_length: 0,
                    truncated: false,
                    failure: Some(failure.reason),
                }
            }
        };

        self.store.insert_resource(&resource)?;
        self.report_progress();
        Ok(())
    }

    async fn polite_fetch(
        &self,
        url: &Url,
    ) -> Result<FetchedResource, FetchFailure> {
        if !self.settings.politeness_delay.is_zero() {
            tokio::time::sleep(self.settings.politeness_delay).await;
        }
        fetch(&self.client, url, &self.settings.fetch_policy).await
    }

    /// Follows the links of a fetched body and builds its resource row
    fn handle_success(
        &self,
        entry: &FrontierEntry,
        fetched: FetchedResource,
    ) -> Result<NewResource, ArchiveError> {
        let kind = if fetched.truncated {
            tracing::debug!("{} truncated at {} bytes", entry.url, fetched.content_length);
            ResourceKind::Other
        } else {
            ResourceKind::classify(fetched.content_type.as_deref())
        };

        tracing::debug!(
            "Fetched {} ({}, {} bytes)",
            entry.url,
            kind,
            fetched.content_length
        );

        if kind.has_links() {
            self.follow_links(entry, &fetched, kind)?;
        }

        Ok(NewResource {
            job_id: self.job_id,
            link: entry.url.clone(),
            host: self.host.clone(),
            kind,
            status_code: Some(fetched.status_code),
            content_type: fetched.content_type,
            content_length: fetched.content_length,
            content: Some(fetched.body),
            truncated: fetched.truncated,
            failure: None,
        })
    }

    fn follow_links(
        &self,
        entry: &FrontierEntry,
        fetched: &FetchedResource,
        kind: ResourceKind,
    ) -> Result<(), ArchiveError> {
        let extraction = extract(&fetched.body, &fetched.final_url, kind);
        for diagnostic in &extraction.diagnostics {
            tracing::debug!("{}: parse diagnostic: {}", entry.url, diagnostic);
        }

        let base = extraction.base_or(&fetched.final_url);
        for raw in &extraction.links {
            let (url, same_host) = match resolve(raw, base, &self.host) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::debug!("Dropping link '{}' on {}: {}", raw, entry.url, e);
                    continue;
                }
            };

            if !same_host {
                self.store
                    .record_external_link(self.job_id, url.as_str(), &entry.url)?;
                continue;
            }

            match self.frontier.push(url.as_str(), entry.depth + 1) {
                PushOutcome::Admitted => {
                    tracing::trace!("Queued {} at depth {}", url, entry.depth + 1)
                }
                PushOutcome::BudgetExhausted => {
                    tracing::trace!("Budget exhausted, not queueing {}", url)
                }
                PushOutcome::AlreadySeen | PushOutcome::Closed => {}
            }
        }

        Ok(())
    }

    fn report_progress(&self) {
        let stored = self.stored.fetch_add(1, Ordering::Relaxed) + 1;
        if stored % PROGRESS_INTERVAL == 0 {
            let rate = stored as f64 / self.start_time.elapsed().as_secs_f64().max(0.001);
            tracing::info!(
                "Job {} progress: {} resources stored, {} queued, {} in flight, {:.2} resources/sec",
                self.job_id,
                stored,
                self.frontier.queued(),
                self.frontier.in_flight(),
                rate
            );
        }
    }
}
