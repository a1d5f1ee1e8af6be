//! Content Crawler: a depth-bounded concurrent crawl scheduler
//!
//! This crate crawls a seed set of URLs breadth-first up to a configured depth,
//! bounding total work, rejecting loop traps, honouring per-domain courtesy
//! delays, and keeping every failure local to the URL that caused it.

pub mod config;
pub mod crawler;
pub mod input;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Seed input error: {0}")]
    Input(String),

    #[error("Crawl run {run_id} failed: {message}")]
    RunFailed { run_id: String, message: String },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Reasons a URL is not a crawl target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Local or private address: {0}")]
    LocalAddress(String),

    #[error("Excluded file extension: {0}")]
    ExcludedExtension(String),

    #[error("Non-HTML resource pattern: {0}")]
    NonHtmlPattern(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator, CrawlLimits};
pub use state::{DomainPolicy, VisitationLedger};
pub use url::{is_same_domain, normalize_url, UrlFilter};
