//! Filesystem storage for fetched page content
//!
//! Each successful page gets its own directory under the content root,
//! named by page ID:
//!
//! ```text
//! <content-dir>/<page_id>/raw.html
//!                         body.txt
//!                         headers.txt
//!                         metadata.txt
//! ```

use crate::crawler::ParsedContent;
use crate::storage::StorageResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Paths written for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPaths {
    pub raw_html: PathBuf,
    pub body: PathBuf,
    pub headers: PathBuf,
    pub metadata: PathBuf,
}

impl ContentPaths {
    fn under(dir: &Path) -> Self {
        Self {
            raw_html: dir.join("raw.html"),
            body: dir.join("body.txt"),
            headers: dir.join("headers.txt"),
            metadata: dir.join("metadata.txt"),
        }
    }
}

/// Sink for raw page bodies and their extracted text
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save_content(
        &self,
        page_id: &str,
        url: &str,
        body: &str,
        parsed: &ParsedContent,
    ) -> StorageResult<ContentPaths>;
}

/// Writes page content below a root directory
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the content of `page_id` lives, whether or not it was written
    pub fn paths_for(&self, page_id: &str) -> ContentPaths {
        ContentPaths::under(&self.root.join(page_id))
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn save_content(
        &self,
        page_id: &str,
        url: &str,
        body: &str,
        parsed: &ParsedContent,
    ) -> StorageResult<ContentPaths> {
        let dir = self.root.join(page_id);
        tokio::fs::create_dir_all(&dir).await?;

        let paths = ContentPaths::under(&dir);
        tokio::fs::write(&paths.raw_html, body).await?;
        tokio::fs::write(&paths.body, &parsed.body_text).await?;
        tokio::fs::write(&paths.headers, &parsed.head_html).await?;
        tokio::fs::write(&paths.metadata, format_metadata(url, parsed)).await?;

        tracing::debug!("Saved content for {} under {}", url, dir.display());
        Ok(paths)
    }
}

fn format_metadata(url: &str, parsed: &ParsedContent) -> String {
    let mut lines = vec![format!("URL: {}", url)];

    if let Some(title) = &parsed.title {
        lines.push(format!("Title: {}", title));
    }
    if let Some(description) = &parsed.meta_description {
        lines.push(format!("Description: {}", description));
    }

    lines.push(format!(
        "Content Length: {} characters",
        parsed.body_text.chars().count()
    ));
    lines.push(format!(
        "Word Count: {} words",
        parsed.body_text.split_whitespace().count()
    ));
    lines.push(format!("Links Found: {}", parsed.links.len()));

    if let Some(hash) = &parsed.content_hash {
        lines.push(format!("Content Hash: {}", hash));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed() -> ParsedContent {
        ParsedContent {
            title: Some("Hello".to_string()),
            meta_description: Some("A page".to_string()),
            body_text: "one two three".to_string(),
            head_html: "<title>Hello</title>".to_string(),
            links: vec!["https://x.test/a".to_string()],
            content_hash: Some("deadbeef".to_string()),
            content_length: 13,
        }
    }

    #[tokio::test]
    async fn test_save_content_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        let paths = store
            .save_content("page-1", "https://x.test/", "<html></html>", &parsed())
            .await
            .unwrap();

        assert_eq!(paths, store.paths_for("page-1"));
        assert_eq!(
            std::fs::read_to_string(&paths.raw_html).unwrap(),
            "<html></html>"
        );
        assert_eq!(
            std::fs::read_to_string(&paths.body).unwrap(),
            "one two three"
        );
        assert_eq!(
            std::fs::read_to_string(&paths.headers).unwrap(),
            "<title>Hello</title>"
        );

        let metadata = std::fs::read_to_string(&paths.metadata).unwrap();
        assert!(metadata.contains("URL: https://x.test/"));
        assert!(metadata.contains("Title: Hello"));
        assert!(metadata.contains("Word Count: 3 words"));
        assert!(metadata.contains("Links Found: 1"));
        assert!(metadata.contains("Content Hash: deadbeef"));
    }

    #[test]
    fn test_metadata_skips_missing_fields() {
        let metadata = format_metadata("https://x.test/", &ParsedContent::default());
        assert!(!metadata.contains("Title:"));
        assert!(!metadata.contains("Content Hash:"));
        assert!(metadata.contains("Links Found: 0"));
    }
}
