//! Seed URL input
//!
//! A run starts from the URLs a [`SeedSource`] provides. Two sources ship
//! with the crate:
//! - [`FileSeedSource`] reads a CSV file, or a file listing CSV paths
//! - [`StaticSeeds`] wraps an in-memory list
//!
//! Both return entries deduplicated by normalized URL, first occurrence wins.

use crate::url::normalize_url;
use crate::CrawlError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One seed URL with its optional description column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub url: String,
    pub description: Option<String>,
}

impl UrlEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }
}

/// Provides the seed list for a run
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Deduplicated seed entries; may be empty
    async fn seed_urls(&self) -> Result<Vec<UrlEntry>, CrawlError>;

    /// Recorded as the run's input reference
    fn describe(&self) -> String;
}

/// Seeds from a `.csv` file or from a file listing CSV paths
///
/// CSV files carry the URL in the first column and an optional description
/// in the second. A first row whose first cell mentions "url" is treated as
/// a header. List files hold one CSV path per line, relative to the list
/// file; blank lines and `#` comments are ignored.
#[derive(Debug, Clone)]
pub struct FileSeedSource {
    path: PathBuf,
}

impl FileSeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_csv(path: &Path) -> bool {
        path.extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
    }

    async fn csv_paths(&self) -> Result<Vec<PathBuf>, CrawlError> {
        let listing = read_input(&self.path).await?;
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));

        let mut paths = Vec::new();
        for (line_num, line) in listing.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let candidate = Path::new(line);
            let path = if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                base.join(candidate)
            };

            if tokio::fs::metadata(&path).await.is_ok() {
                paths.push(path);
            } else {
                tracing::warn!(
                    "CSV file not found: {} (line {} of {})",
                    path.display(),
                    line_num + 1,
                    self.path.display()
                );
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl SeedSource for FileSeedSource {
    async fn seed_urls(&self) -> Result<Vec<UrlEntry>, CrawlError> {
        tracing::info!("Reading seed URLs from {}", self.path.display());

        let mut entries = Vec::new();
        if Self::is_csv(&self.path) {
            entries.extend(read_csv(&self.path).await?);
        } else {
            let files = self.csv_paths().await?;
            tracing::debug!("{} lists {} CSV files", self.path.display(), files.len());
            for file in files {
                entries.extend(read_csv(&file).await?);
            }
        }

        let unique = deduplicate(entries);
        tracing::info!("Loaded {} unique seed URLs", unique.len());
        Ok(unique)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Seeds held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticSeeds {
    urls: Vec<String>,
}

impl StaticSeeds {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SeedSource for StaticSeeds {
    async fn seed_urls(&self) -> Result<Vec<UrlEntry>, CrawlError> {
        Ok(deduplicate(
            self.urls.iter().map(|url| UrlEntry::new(url.as_str())).collect(),
        ))
    }

    fn describe(&self) -> String {
        match self.urls.as_slice() {
            [single] => single.clone(),
            urls => format!("{} inline URLs", urls.len()),
        }
    }
}

async fn read_input(path: &Path) -> Result<String, CrawlError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CrawlError::Input(format!("{}: {}", path.display(), e)))
}

/// Extracts entries from CSV text, skipping invalid URLs
///
/// Quoted cells may span lines; only the first two columns are read.
fn parse_csv(content: &str) -> Result<Vec<UrlEntry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut entries = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let first = record.get(0).unwrap_or_default();

        if index == 0 && first.to_ascii_lowercase().contains("url") && normalize_url(first).is_err()
        {
            continue;
        }
        if first.is_empty() {
            continue;
        }

        if let Err(e) = normalize_url(first) {
            let line = record.position().map_or(index as u64 + 1, |p| p.line());
            tracing::debug!("Skipping seed {:?} on line {}: {}", first, line, e);
            continue;
        }

        entries.push(UrlEntry {
            url: first.to_string(),
            description: record.get(1).filter(|d| !d.is_empty()).map(str::to_string),
        });
    }

    Ok(entries)
}

async fn read_csv(path: &Path) -> Result<Vec<UrlEntry>, CrawlError> {
    let content = read_input(path).await?;
    parse_csv(&content).map_err(|e| CrawlError::Input(format!("{}: {}", path.display(), e)))
}

/// Keeps the first entry for each normalized URL
fn deduplicate(entries: Vec<UrlEntry>) -> Vec<UrlEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let key = normalize_url(&entry.url)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| entry.url.clone());
            seen.insert(key)
        })
        .collect()
}
