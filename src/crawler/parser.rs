//! Content parsing for fetched pages
//!
//! The crawl engine treats extraction as a collaborator behind the
//! [`ContentParser`] trait. The bundled [`HtmlContentParser`] picks a
//! [`ContentStrategy`] per payload and extracts:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title and meta description
//! - Visible body text and the raw <head> markup
//! - A SHA-256 fingerprint of the body

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Extracted information from a fetched page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Content of `<meta name="description">`
    pub meta_description: Option<String>,

    /// Visible text, whitespace-collapsed
    pub body_text: String,

    /// Serialized <head> element
    pub head_html: String,

    /// All links found on the page (absolute URLs, first occurrence order)
    pub links: Vec<String>,

    /// Hex SHA-256 of the raw body
    pub content_hash: Option<String>,

    /// Raw body length in bytes
    pub content_length: u64,
}

/// Errors a content parser may report
///
/// The worker never fails a task over these; it stores the page with an
/// empty parse result instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported content type: {0}")]
    Unsupported(String),

    #[error("Invalid selector: {0}")]
    Selector(String),
}

/// Extraction strategy for one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategy {
    Html,
    PlainText,
    Unsupported,
}

impl ContentStrategy {
    /// Picks a strategy from the Content-Type header, sniffing the body
    /// when the header is absent or a generic `text/*` type
    pub fn classify(content_type: Option<&str>, body: &str) -> Self {
        match content_type.map(|ct| ct.to_ascii_lowercase()) {
            Some(ct) if ct.contains("html") => Self::Html,
            Some(ct) if ct.starts_with("text/") => Self::sniff(body),
            Some(ct) if ct.trim().is_empty() => Self::sniff(body),
            Some(_) => Self::Unsupported,
            None => Self::sniff(body),
        }
    }

    fn sniff(body: &str) -> Self {
        let head: String = body
            .trim_start()
            .chars()
            .take(512)
            .collect::<String>()
            .to_ascii_lowercase();

        if head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<body")
        {
            Self::Html
        } else {
            Self::PlainText
        }
    }
}

/// Turns a fetched body into [`ParsedContent`]
///
/// Runs on the blocking pool, so implementations may be CPU heavy.
pub trait ContentParser: Send + Sync {
    fn parse(
        &self,
        body: &str,
        url: &Url,
        content_type: Option<&str>,
    ) -> Result<ParsedContent, ParseError>;
}

/// Default parser built on `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlContentParser;

impl ContentParser for HtmlContentParser {
    fn parse(
        &self,
        body: &str,
        url: &Url,
        content_type: Option<&str>,
    ) -> Result<ParsedContent, ParseError> {
        match ContentStrategy::classify(content_type, body) {
            ContentStrategy::Html => parse_html(body, url),
            ContentStrategy::PlainText => Ok(ParsedContent {
                body_text: collapse_whitespace(body),
                content_hash: Some(content_hash(body)),
                content_length: body.len() as u64,
                ..ParsedContent::default()
            }),
            ContentStrategy::Unsupported => Err(ParseError::Unsupported(
                content_type.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only anchors
///
/// `rel="nofollow"` links are followed.
pub fn parse_html(html: &str, base_url: &Url) -> Result<ParsedContent, ParseError> {
    let document = Html::parse_document(html);

    Ok(ParsedContent {
        title: extract_title(&document),
        meta_description: extract_meta_description(&document),
        body_text: extract_body_text(&document),
        head_html: extract_head(&document),
        links: extract_links(&document, base_url)?,
        content_hash: Some(content_hash(html)),
        content_length: html.len() as u64,
    })
}

/// Hex SHA-256 of `body`
pub fn content_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{}: {:?}", css, e)))
}

fn first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css).ok()?;
    let element = document.select(&selector).next();
    element
}

fn extract_title(document: &Html) -> Option<String> {
    first(document, "title")
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_meta_description(document: &Html) -> Option<String> {
    first(document, "meta[name='description'][content]")
        .and_then(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn extract_head(document: &Html) -> String {
    first(document, "head")
        .map(|element| element.html())
        .unwrap_or_default()
}

/// Text under <body>, skipping script and style contents
fn extract_body_text(document: &Html) -> String {
    let Some(body) = first(document, "body") else {
        return String::new();
    };

    let mut words = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn extract_links(document: &Html, base_url: &Url) -> Result<Vec<String>, ParseError> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut push = |href: &str| {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    };

    for element in document.select(&selector("a[href]")?) {
        if element.value().attr("download").is_some() {
            continue;
        }
        if let Some(href) = element.value().attr("href") {
            push(href);
        }
    }

    for element in document.select(&selector("link[rel='canonical'][href]")?) {
        if let Some(href) = element.value().attr("href") {
            push(href);
        }
    }

    Ok(links)
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then(|| absolute_url.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
