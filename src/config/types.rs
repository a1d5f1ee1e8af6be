use crate::state::DomainPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
///
/// Every section and key is optional; missing values fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers, also the size of the fetch semaphore
    #[serde(rename = "max-workers")]
    pub max_workers: usize,

    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of tasks ever queued in one run; omit (or set 0) for uncapped
    #[serde(rename = "max-pages")]
    pub max_pages: Option<usize>,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "rate-limit-delay")]
    pub rate_limit_delay: u64,

    /// Follow links whose domain differs from the linking page
    #[serde(rename = "allow-cross-domain")]
    pub allow_cross_domain: bool,

    /// Reject paths with repeated segments
    #[serde(rename = "enable-loop-prevention")]
    pub enable_loop_prevention: bool,

    /// How many times one path segment may appear before the path is rejected
    #[serde(rename = "max-repeated-segments")]
    pub max_repeated_segments: usize,

    /// Whether a domain may be visited once per run or once per URL
    #[serde(rename = "domain-policy")]
    pub domain_policy: DomainPolicy,

    /// Retries after the first attempt, for timeouts and 5xx only
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-base-delay")]
    pub retry_base_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// How long a worker waits on an empty frontier before exiting (milliseconds)
    #[serde(rename = "idle-timeout")]
    pub idle_timeout: u64,

    /// Interval between statistics snapshots (seconds)
    #[serde(rename = "stats-interval")]
    pub stats_interval: u64,

    /// Accept loopback and private network hosts
    #[serde(rename = "allow-private-hosts")]
    pub allow_private_hosts: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            max_depth: 3,
            max_pages: None,
            rate_limit_delay: 1000,
            allow_cross_domain: false,
            enable_loop_prevention: true,
            max_repeated_segments: 2,
            domain_policy: DomainPolicy::PerUrl,
            max_retries: 3,
            retry_base_delay: 1000,
            request_timeout: 30,
            idle_timeout: 5000,
            stats_interval: 30,
            allow_private_hosts: false,
        }
    }
}

impl CrawlerConfig {
    /// The page cap, or `None` when uncapped
    pub fn page_cap(&self) -> Option<usize> {
        self.max_pages.filter(|&cap| cap > 0)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_timeout)
    }

    pub fn stats_period(&self) -> Duration {
        Duration::from_secs(self.stats_interval)
    }
}

/// HTTP session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Upper bound on the number of independent client sessions
    #[serde(rename = "fetcher-pool-cap")]
    pub fetcher_pool_cap: usize,

    /// Redirect hops followed before giving up
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("content-crawler/{}", env!("CARGO_PKG_VERSION")),
            fetcher_pool_cap: 5,
            max_redirects: 5,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory that receives saved page content
    #[serde(rename = "content-dir")]
    pub content_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./content_crawler.db".to_string(),
            content_dir: "./data/content".to_string(),
        }
    }
}
