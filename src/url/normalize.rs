use crate::UrlError;
use url::Url;

/// Query keys that only identify a campaign or referrer, never content
const TRACKING_KEYS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Canonicalizes a URL into the key used for deduplication
///
/// Two URLs that normalize to the same string are the same crawl target.
/// The canonical form:
/// - has an http or https scheme, a lowercase host and no default port
/// - has `.`/`..` segments resolved, repeated slashes collapsed and no
///   trailing slash (the root stays `/`)
/// - has no fragment
/// - keeps only non-tracking query pairs, sorted, and drops a bare `?`
///
/// Crawlability rules (local hosts, file extensions, API paths) live in
/// [`UrlFilter`](crate::url::UrlFilter).
///
/// # Examples
///
/// ```
/// use content_crawler::url::normalize_url;
///
/// let a = normalize_url("https://X.TEST/page/").unwrap();
/// let b = normalize_url("https://x.test/page?").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "https://x.test/page");
/// ```
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    // Host case and default ports are already handled by the parser.
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let path = resolve_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    match canonical_query(&url) {
        Some(pairs) => {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        None => url.set_query(None),
    }

    Ok(url)
}

/// Resolves dot segments and drops empty ones
fn resolve_path(path: &str) -> String {
    let resolved = path.split('/').fold(Vec::new(), |mut stack, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            kept => stack.push(kept),
        }
        stack
    });

    format!("/{}", resolved.join("/"))
}

/// Sorted query pairs with tracking keys removed; `None` when nothing is left
fn canonical_query(url: &Url) -> Option<Vec<(String, String)>> {
    url.query()?;

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_") && !TRACKING_KEYS.contains(&&**key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        return None;
    }
    pairs.sort();
    Some(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(raw: &str) -> String {
        normalize_url(raw).unwrap().to_string()
    }

    #[test]
    fn test_equivalent_forms_share_a_key() {
        for raw in [
            "https://x.test/page",
            "https://x.test/page/",
            "https://x.test/page?",
            "https://X.TEST/page#top",
            "https://x.test:443/page",
            "https://x.test//page//",
            "https://x.test/docs/../page",
            "https://x.test/./page",
            "https://x.test/page?utm_source=feed&fbclid=abc",
        ] {
            assert_eq!(canonical(raw), "https://x.test/page", "{}", raw);
        }
    }

    #[test]
    fn test_root_keeps_its_slash() {
        assert_eq!(canonical("https://x.test"), "https://x.test/");
        assert_eq!(canonical("https://x.test/"), "https://x.test/");
        assert_eq!(canonical("https://x.test/../"), "https://x.test/");
    }

    #[test]
    fn test_distinct_targets_stay_distinct() {
        assert_eq!(canonical("http://x.test/page"), "http://x.test/page");
        assert_eq!(canonical("https://x.test/Page"), "https://x.test/Page");
        assert_eq!(canonical("http://x.test:8080/page"), "http://x.test:8080/page");
    }

    #[test]
    fn test_query_is_filtered_and_sorted() {
        assert_eq!(
            canonical("https://x.test/list?page=2&utm_medium=email&sort=asc&ref=home"),
            "https://x.test/list?page=2&sort=asc"
        );
        assert_eq!(canonical("https://x.test/list?b=2&a=1"), "https://x.test/list?a=1&b=2");
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            normalize_url("ftp://x.test/file"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("mailto:someone@x.test"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
        assert!(matches!(normalize_url("/relative/path"), Err(UrlError::Parse(_))));
    }
}
