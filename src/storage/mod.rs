//! Storage module for persisting crawl data
//!
//! This module holds the collaborators the crawl engine writes through:
//! - The `Storage` trait for run records and page results, with a SQLite backend
//! - The `FileStore` trait for raw page content, with a filesystem backend

mod files;
mod schema;
mod sqlite;
mod traits;

pub use files::{ContentPaths, DiskFileStore, FileStore};
pub use sqlite::SqliteStorage;
pub use traits::{lock_storage, SharedStorage, Storage, StorageError, StorageResult};

use crate::CrawlError;
use std::path::Path;

/// Opens (or creates) the SQLite database at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CrawlError> {
    Ok(SqliteStorage::new(path)?)
}

/// The immutable record of one fetch attempt, success or failure
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Fresh UUID per task
    pub page_id: String,
    pub run_id: String,
    pub url: String,
    pub domain: String,
    pub status_code: u16,
    pub depth: u32,
    /// Back-reference to the page this URL was discovered on
    pub parent_page_id: Option<String>,
    pub referer_url: Option<String>,
    pub content_hash: Option<String>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub error_message: Option<String>,
    /// Attempts beyond the first
    pub retry_count: u32,
}

impl PageResult {
    /// A 2xx response with no recorded error
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && self.error_message.is_none()
    }
}

/// A stored page result with its insertion timestamp
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub page: PageResult,
    pub created_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub input_ref: String,
    pub status: RunStatus,
    pub max_depth: u32,
    pub total_urls: u64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Status of a crawl run
///
/// `Running` moves to exactly one of the terminal states and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(self, Self::Running) && next.is_terminal()
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
