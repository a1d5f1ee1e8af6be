//! Crawlability rules applied on top of normalization
//!
//! A URL that normalizes cleanly can still be a poor crawl target: a local
//! address, a binary download, or an API endpoint that will never return HTML.

use crate::url::normalize::normalize_url;
use crate::UrlError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// File extensions that are never fetched
const EXCLUDED_EXTENSIONS: &[&str] = &[
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv",
    // Archives
    "zip", "rar", "tar", "gz", "7z",
    // Media
    "mp3", "wav", "mp4", "avi", "mov", "wmv", "flv", "jpg", "jpeg", "png", "gif", "bmp",
    "svg", "webp", "ico",
    // Binaries and installers
    "exe", "msi", "dmg", "deb", "rpm",
    // Web assets and feeds
    "css", "js", "json", "xml", "rss", "atom", "woff", "woff2",
];

/// Path fragments that mark API or download endpoints
const NON_HTML_PATH_PATTERNS: &[&str] = &[
    "/api/",
    "/rest/",
    "/graphql",
    "/rpc/",
    "/download/",
    "/file/",
    "/asset/",
];

/// Host prefixes that mark API services
const NON_HTML_HOST_PREFIXES: &[&str] = &["api.", "rest.", "graphql."];

/// Decides whether a URL is a crawl target
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlFilter {
    /// Accept loopback and private network hosts
    pub allow_private_hosts: bool,
}

impl UrlFilter {
    pub fn new(allow_private_hosts: bool) -> Self {
        Self {
            allow_private_hosts,
        }
    }

    /// Normalizes `url_str` and applies every crawlability rule
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The canonical form of an admissible URL
    /// * `Err(UrlError)` - The reason the URL is rejected
    ///
    /// # Examples
    ///
    /// ```
    /// use content_crawler::url::UrlFilter;
    ///
    /// let filter = UrlFilter::default();
    /// assert!(filter.admit("https://example.com/about/").is_ok());
    /// assert!(filter.admit("https://example.com/report.pdf").is_err());
    /// assert!(filter.admit("http://localhost:8080/").is_err());
    /// ```
    pub fn admit(&self, url_str: &str) -> Result<Url, UrlError> {
        let url = normalize_url(url_str)?;
        self.check(&url)?;
        Ok(url)
    }

    /// Applies the crawlability rules to an already normalized URL
    pub fn check(&self, url: &Url) -> Result<(), UrlError> {
        let host = url.host().ok_or(UrlError::MissingDomain)?;

        if !self.allow_private_hosts && is_local_host(&host) {
            return Err(UrlError::LocalAddress(host.to_string()));
        }

        if let Some(ext) = excluded_extension(url.path()) {
            return Err(UrlError::ExcludedExtension(ext));
        }

        if let Some(pattern) = non_html_pattern(url) {
            return Err(UrlError::NonHtmlPattern(pattern.to_string()));
        }

        Ok(())
    }

    /// Convenience predicate over [`admit`](Self::admit)
    pub fn is_crawlable(&self, url_str: &str) -> bool {
        self.admit(url_str).is_ok()
    }
}

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.');
            name == "localhost" || name.ends_with(".localhost") || name.ends_with(".local")
        }
        Host::Ipv4(addr) => is_local_ipv4(addr),
        Host::Ipv6(addr) => is_local_ipv6(addr),
    }
}

fn is_local_ipv4(addr: &Ipv4Addr) -> bool {
    addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
}

fn is_local_ipv6(addr: &Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_local_ipv4(&v4);
    }
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
}

/// Returns the extension of the last path segment when it is excluded
fn excluded_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXCLUDED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn non_html_pattern(url: &Url) -> Option<&'static str> {
    // Normalized paths lose their trailing slash; restore one so `/api` still
    // matches `/api/`.
    let path = format!("{}/", url.path().to_ascii_lowercase());
    if let Some(pattern) = NON_HTML_PATH_PATTERNS
        .iter()
        .find(|pattern| path.contains(*pattern))
    {
        return Some(*pattern);
    }

    let host = url.host_str()?;
    NON_HTML_HOST_PREFIXES
        .iter()
        .find(|prefix| host.starts_with(*prefix))
        .copied()
}
