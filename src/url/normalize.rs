use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a URL according to Rewind's canonicalization rules
///
/// # Normalization Steps
///
/// 1. Resolve the reference against `base` when one is given; otherwise parse
///    it as an absolute URL. Reject it if malformed.
/// 2. Accept only `http` and `https`
/// 3. Lowercase scheme and host, drop default ports and remove dot segments
///    (all performed by the URL parser)
/// 4. Require a non-empty host
/// 5. Remove the fragment
/// 6. Collapse runs of repeated slashes in the path; an empty path becomes `/`
///
/// A single trailing slash is kept, so `/a` and `/a/` stay distinct, and the
/// query string is kept verbatim because servers may treat parameter order
/// as significant.
///
/// # Arguments
///
/// * `raw` - The URL or reference to normalize
/// * `base` - The page the reference was found on, if any
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use rewind::url::normalize_url;
///
/// let url = normalize_url("HTTPS://Example.COM:443//docs//page/#intro", None).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/page/");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> UrlResult<Url> {
    let trimmed = raw.trim();

    let parsed = match base {
        Some(base) => base.join(trimmed),
        None => Url::parse(trimmed),
    };
    let mut url = parsed.map_err(|e| UrlError::Malformed {
        input: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost(raw.to_string()));
    }

    url.set_fragment(None);

    let collapsed = collapse_slashes(url.path());
    if collapsed != url.path() {
        url.set_path(&collapsed);
    }

    Ok(url)
}

/// Collapses repeated slashes in a URL path
fn collapse_slashes(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut result = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !previous_slash {
                result.push(ch);
            }
            previous_slash = true;
        } else {
            result.push(ch);
            previous_slash = false;
        }
    }

    result
}
