//! Replay of archived jobs
//!
//! A stored job is served back as a self-contained snapshot: HTML documents
//! have their references retargeted to `/web/{job}{modifier}/{url}` addresses
//! when the job captured the target, or to the absolute original URL when it
//! did not. Every other kind is served as stored.

mod rewrite;

pub use rewrite::{
    kind_modifier, parse_replay_path, replay_path, rewrite_css, rewrite_html, CapturedLinks,
    RewriteContext, REPLAY_PREFIX,
};

use crate::crawler::document_base;
use crate::state::ResourceKind;
use crate::storage::{ResourceStore, StorageError};
use crate::url::normalize_url;
use crate::UrlError;
use scraper::Html;
use std::sync::Arc;
use thiserror::Error;

/// Content type used when a stored resource has none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors that can occur while replaying
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("No resource {url} in job {job_id}")]
    NotFound { job_id: i64, url: String },

    #[error("Not a replay address: {0}")]
    InvalidPath(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A stored resource ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResource {
    /// The normalized link the resource was stored under
    pub link: String,

    pub kind: ResourceKind,

    /// Stored status code; absent if the fetch never got a response
    pub status_code: Option<u16>,

    pub content_type: String,

    /// Served bytes (empty for failed fetches)
    pub body: Vec<u8>,
}

/// Serves stored resources of any job
///
/// The replayer holds only a query capability on the store. The set of
/// captured links is looked up from the store on every render.
pub struct Replayer {
    store: Arc<dyn ResourceStore>,
}

impl Replayer {
    /// Creates a replayer over a store
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Renders the resource a job stored for a URL
    ///
    /// # Arguments
    ///
    /// * `job_id` - The job to replay from
    /// * `original_url` - The URL as it was on the live site (normalized before lookup)
    ///
    /// # Returns
    ///
    /// * `Ok(RenderedResource)` - The resource, HTML rewritten into the job
    /// * `Err(ReplayError::NotFound)` - The job did not capture this URL
    pub fn render(&self, job_id: i64, original_url: &str) -> Result<RenderedResource, ReplayError> {
        let url = normalize_url(original_url, None)?;
        let resource = self
            .store
            .get_resource(job_id, url.as_str())?
            .ok_or_else(|| ReplayError::NotFound {
                job_id,
                url: url.to_string(),
            })?;

        let record = resource.record;
        let content_type = record
            .content_type
            .clone()
            .unwrap_or_else(|| match record.kind {
                ResourceKind::Html => "text/html; charset=utf-8".to_string(),
                _ => DEFAULT_CONTENT_TYPE.to_string(),
            });

        let body = match resource.content {
            None => Vec::new(),
            Some(content) if record.kind == ResourceKind::Html => {
                self.rewrite_document(job_id, &url, &content)?.into_bytes()
            }
            Some(content) => content,
        };

        tracing::debug!(
            "Rendered {} from job {} ({}, {} bytes)",
            record.link,
            job_id,
            record.kind,
            body.len()
        );

        Ok(RenderedResource {
            link: record.link,
            kind: record.kind,
            status_code: record.status_code,
            content_type,
            body,
        })
    }

    /// Renders the resource behind a replay address such as `/web/7im_/https%3A...`
    pub fn render_path(&self, path: &str) -> Result<RenderedResource, ReplayError> {
        let (job_id, url) =
            parse_replay_path(path).ok_or_else(|| ReplayError::InvalidPath(path.to_string()))?;
        self.render(job_id, &url)
    }

    fn rewrite_document(
        &self,
        job_id: i64,
        url: &url::Url,
        content: &[u8],
    ) -> Result<String, ReplayError> {
        let html = String::from_utf8_lossy(content);
        let base = document_base(&Html::parse_document(&html), url).unwrap_or_else(|| url.clone());

        let captured: CapturedLinks = self
            .store
            .list_resources_by_job(job_id)?
            .into_iter()
            .map(|record| (record.link, record.kind))
            .collect();

        let context = RewriteContext {
            job_id,
            base: &base,
            captured: &captured,
        };
        Ok(rewrite_html(&html, &context))
    }
}
