//! URL handling module for Rewind
//!
//! This module provides URL normalization, host extraction and same-host
//! scoping. Every URL that enters the frontier or is looked up during replay
//! goes through [`normalize_url`] first, so that two spellings of the same
//! resource share one key.

mod host;
mod normalize;

use crate::UrlResult;
use ::url::Url;

// Re-export main functions
pub use host::{host_key, is_same_host};
pub use normalize::normalize_url;

/// Schemes and prefixes that never point at a fetchable resource
const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "about:", "blob:"];

/// Resolves a reference found on a page and reports whether it stays on the job host
///
/// # Arguments
///
/// * `raw` - The reference as it appeared in the document (may be relative)
/// * `base` - The URL the reference is relative to
/// * `job_host` - The host key of the running job (see [`host_key`])
///
/// # Returns
///
/// * `Ok((Url, bool))` - The normalized URL and whether it is on the job host
/// * `Err(UrlError)` - The reference could not be turned into an http(s) URL
///
/// # Examples
///
/// ```
/// use rewind::url::resolve;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let (url, same_host) = resolve("../about#team", &base, "example.com").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// assert!(same_host);
///
/// let (_, same_host) = resolve("https://other.com/b", &base, "example.com").unwrap();
/// assert!(!same_host);
/// ```
pub fn resolve(raw: &str, base: &Url, job_host: &str) -> UrlResult<(Url, bool)> {
    let url = normalize_url(raw, Some(base))?;
    let same_host = is_same_host(&url, job_host);
    Ok((url, same_host))
}

/// Returns true if a raw reference could point at a fetchable resource
///
/// Empty references, fragment-only references and non-network schemes such as
/// `javascript:` or `data:` are rejected before any parsing happens.
pub fn is_fetchable_reference(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return false;
    }

    let lower = raw.to_ascii_lowercase();
    !SKIPPED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}
