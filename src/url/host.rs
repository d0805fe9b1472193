use url::Url;

/// Extracts the host key of a URL
///
/// The host key is the lowercase host, followed by `:port` when the URL
/// carries a non-default port. Two URLs belong to the same archive job only if
/// their host keys are equal; there is no subdomain or `www.` folding.
///
/// # Arguments
///
/// * `url` - The URL to extract the host key from
///
/// # Returns
///
/// * `Some(String)` - The host key
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use rewind::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
///
/// let url = Url::parse("https://example.com:443/").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }

    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns true if the URL's host key equals `job_host` exactly
pub fn is_same_host(url: &Url, job_host: &str) -> bool {
    host_key(url).as_deref() == Some(job_host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_simple() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(host_key(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_host_key_keeps_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(host_key(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_host_key_with_custom_port() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(host_key(&url), Some("example.com:8443".to_string()));
    }

    #[test]
    fn test_host_key_drops_default_port() {
        let url = Url::parse("http://example.com:80/").unwrap();
        assert_eq!(host_key(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_host_key_ipv6() {
        let url = Url::parse("http://[::1]:3000/").unwrap();
        assert_eq!(host_key(&url), Some("[::1]:3000".to_string()));
    }

    #[test]
    fn test_host_key_without_host() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(host_key(&url), None);
    }

    #[test]
    fn test_is_same_host() {
        let url = Url::parse("https://Example.com/a").unwrap();
        assert!(is_same_host(&url, "example.com"));
        assert!(!is_same_host(&url, "www.example.com"));
        assert!(!is_same_host(&url, "example.com:8080"));
    }
}
