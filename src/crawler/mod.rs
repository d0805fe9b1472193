//! Crawler module for archive job execution
//!
//! This module contains the capture side of the archiver, including:
//! - The per-job frontier with its page budget and visited set
//! - HTTP fetching with retry logic and a body size cap
//! - Link extraction from HTML and CSS
//! - The worker pool that runs one job to completion

mod coordinator;
pub(crate) mod css;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{Coordinator, JobSettings, JobTarget};
pub use fetcher::{
    build_http_client, fetch, FetchFailure, FetchPolicy, FetchedResource, MAX_REDIRECTS,
};
pub use frontier::{Frontier, FrontierEntry, PushOutcome};
pub use parser::{document_base, extract, srcset_urls, Extraction};
