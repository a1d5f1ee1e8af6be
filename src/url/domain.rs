use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or `None` when the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use content_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether two hosts belong to the same site
///
/// Exact matches count, as does a direct subdomain relationship in either
/// direction (`api.example.com` and `example.com`). Sibling subdomains
/// (`a.example.com` and `b.example.com`) do not.
///
/// # Examples
///
/// ```
/// use content_crawler::url::is_same_domain;
///
/// assert!(is_same_domain("example.com", "example.com"));
/// assert!(is_same_domain("api.example.com", "example.com"));
/// assert!(is_same_domain("example.com", "blog.example.com"));
/// assert!(!is_same_domain("a.example.com", "b.example.com"));
/// assert!(!is_same_domain("example.com", "badexample.com"));
/// ```
pub fn is_same_domain(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches('.').to_ascii_lowercase();
    let b = b.trim_end_matches('.').to_ascii_lowercase();

    if a.is_empty() || b.is_empty() {
        return false;
    }

    a == b || is_subdomain_of(&a, &b) || is_subdomain_of(&b, &a)
}

/// Checks whether two URLs share a site per [`is_same_domain`]
pub fn is_same_domain_url(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(a), Some(b)) => is_same_domain(a, b),
        _ => false,
    }
}

fn is_subdomain_of(candidate: &str, base: &str) -> bool {
    candidate
        .strip_suffix(base)
        .map_or(false, |prefix| prefix.ends_with('.'))
}
