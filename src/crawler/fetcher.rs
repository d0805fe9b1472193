//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for an archive job, including:
//! - Building one HTTP client per job with the configured user agent
//! - Following redirects only while they stay on the job host
//! - Retry with exponential backoff for transient failures
//! - Reading bodies up to a size cap

use crate::config::CrawlerConfig;
use crate::url::host_key;
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use url::Url;

/// Maximum number of redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Timeout, retry and size limits applied to every fetch of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Bound on one attempt, body included
    pub timeout: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry; doubled for every further retry
    pub backoff: Duration,

    /// Bodies beyond this many bytes are truncated
    pub max_body_bytes: usize,
}

impl FetchPolicy {
    /// Derives a policy from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Delay before retry number `retry` (1-based): `backoff * 2^(retry-1)`
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// A successful (2xx) fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    /// URL of the response after same-host redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Body bytes, at most `max_body_bytes` of them
    pub body: Vec<u8>,

    /// Number of bytes in `body`
    pub content_length: u64,

    /// True if the body hit the size cap
    pub truncated: bool,
}

/// A fetch that produced no usable body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Human-readable reason
    pub reason: String,

    /// Status of the final response, absent for transport failures
    pub status_code: Option<u16>,

    /// Content-Type of the final response, if there was one
    pub content_type: Option<String>,
}

impl FetchFailure {
    fn transport(error: &reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            format!("timeout: {}", error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else if error.is_redirect() {
            format!("redirect error: {}", error)
        } else {
            format!("request failed: {}", error)
        };

        Self {
            reason,
            status_code: None,
            content_type: None,
        }
    }
}

/// Outcome of a single attempt
enum Attempt {
    Done(Result<FetchedResource, FetchFailure>),
    Retry(FetchFailure),
}

/// Builds the HTTP client of one job
///
/// Redirects are followed for at most [`MAX_REDIRECTS`] hops and only while
/// the target stays on `job_host`. A redirect that leaves the host is not
/// followed, so the 3xx response itself becomes the fetch outcome.
///
/// # Arguments
///
/// * `user_agent` - The `User-Agent` header value
/// * `job_host` - The host key of the job (see [`host_key`])
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, job_host: &str) -> Result<Client, reqwest::Error> {
    let job_host = job_host.to_string();
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if host_key(attempt.url()).as_deref() == Some(job_host.as_str()) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with retry and body size handling
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx | Read body → success |
/// | 3xx (unfollowed redirect), 4xx | Immediate failure |
/// | 5xx | Retry, then failure with the last status |
/// | Connect error / timeout / transport error | Retry, then failure without status |
///
/// The delay before retry `n` is [`FetchPolicy::backoff_for`]`(n)`.
///
/// # Arguments
///
/// * `client` - The job's HTTP client
/// * `url` - The URL to fetch
/// * `policy` - Timeout, retry and size limits
pub async fn fetch(
    client: &Client,
    url: &Url,
    policy: &FetchPolicy,
) -> Result<FetchedResource, FetchFailure> {
    let mut retries = 0;

    loop {
        let failure = match fetch_once(client, url, policy).await {
            Attempt::Done(result) => return result,
            Attempt::Retry(failure) => failure,
        };

        if retries >= policy.max_retries {
            return Err(failure);
        }

        retries += 1;
        let delay = policy.backoff_for(retries);
        tracing::debug!(
            "Retrying {} in {:?} (attempt {}/{}): {}",
            url,
            delay,
            retries,
            policy.max_retries,
            failure.reason
        );
        tokio::time::sleep(delay).await;
    }
}

async fn fetch_once(client: &Client, url: &Url, policy: &FetchPolicy) -> Attempt {
    let response = match client.get(url.clone()).timeout(policy.timeout).send().await {
        Ok(response) => response,
        Err(e) if is_transient(&e) => return Attempt::Retry(FetchFailure::transport(&e)),
        Err(e) => return Attempt::Done(Err(FetchFailure::transport(&e))),
    };

    let status = response.status();
    let content_type = header_content_type(&response);

    if status.is_server_error() {
        return Attempt::Retry(FetchFailure {
            reason: format!("HTTP {}", status),
            status_code: Some(status.as_u16()),
            content_type,
        });
    }

    if !status.is_success() {
        return Attempt::Done(Err(FetchFailure {
            reason: format!("HTTP {}", status),
            status_code: Some(status.as_u16()),
            content_type,
        }));
    }

    let final_url = response.url().clone();
    match read_body(response, policy.max_body_bytes).await {
        Ok((body, truncated)) => Attempt::Done(Ok(FetchedResource {
            final_url,
            status_code: status.as_u16(),
            content_type,
            content_length: body.len() as u64,
            body,
            truncated,
        })),
        Err(e) => Attempt::Retry(FetchFailure::transport(&e)),
    }
}

/// Reads a body chunk by chunk, stopping at `max_bytes`
async fn read_body(
    mut response: Response,
    max_bytes: usize,
) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut body = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }

    Ok((body, false))
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Returns true for connection-level failures worth another attempt
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_redirect() || error.is_builder() {
        return false;
    }
    error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
}
