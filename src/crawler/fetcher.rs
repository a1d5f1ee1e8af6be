//! HTTP fetching for the crawl workers
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Per-domain courtesy delays shared by every session
//! - Retry with exponential backoff for timeouts and 5xx responses
//! - Mapping transport errors to synthetic statuses
//! - A round-robin pool of independent sessions

use crate::config::{Config, CrawlerConfig, HttpConfig};
use crate::state::DomainRegistry;
use crate::url::extract_domain;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Status recorded when a request timed out
pub const TIMEOUT_STATUS: u16 = 408;

/// Status recorded when no HTTP response was received at all
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Longest jitter added to a rate-limit wait
const MAX_RATE_LIMIT_JITTER: Duration = Duration::from_millis(100);

/// Keeps `base * 2^attempt` from overflowing
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// One response as received from the network
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
}

/// Why a single attempt produced no response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// The status a failed attempt is recorded with
    pub fn synthetic_status(&self) -> u16 {
        match self {
            Self::Timeout => TIMEOUT_STATUS,
            Self::Connect(_) | Self::Other(_) => TRANSPORT_FAILURE_STATUS,
        }
    }
}

/// Performs a single GET attempt
///
/// Implementations own their connection state; the fetcher layers rate
/// limiting and retries on top.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP session configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest`-backed transport with its own connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(classify_error)?;

        Ok(RawResponse {
            status,
            body,
            headers,
            content_type,
        })
    }
}

fn classify_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Outcome of a fetch after all retries
///
/// Transport failures carry a synthetic status and an empty body, so every
/// fetch yields something a worker can record.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    /// Attempts made, at least one
    pub attempts: u32,
    /// Set for non-2xx statuses and transport failures
    pub error: Option<String>,
}

impl FetchOutcome {
    fn from_response(response: RawResponse, attempts: u32) -> Self {
        let error = (!(200..300).contains(&response.status))
            .then(|| format!("HTTP {}", response.status));
        Self {
            status: response.status,
            body: response.body,
            headers: response.headers,
            content_type: response.content_type,
            attempts,
            error,
        }
    }

    fn from_error(error: TransportError, attempts: u32) -> Self {
        Self {
            status: error.synthetic_status(),
            attempts,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.error.is_none()
    }

    /// Attempts beyond the first
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Timing knobs shared by every fetcher in a pool
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Minimum spacing between requests to one domain
    pub rate_limit: Duration,
    /// First retry delay; doubles per attempt
    pub retry_base: Duration,
    pub max_retries: u32,
}

impl FetchPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            rate_limit: config.rate_limit(),
            retry_base: config.retry_base(),
            max_retries: config.max_retries,
        }
    }

    /// Delay before retry number `attempt + 1`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.retry_base.saturating_mul(factor) + random_up_to(self.retry_base / 10)
    }
}

fn random_up_to(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// One HTTP session plus the shared rate-limit registry
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    domains: Arc<DomainRegistry>,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, domains: Arc<DomainRegistry>, policy: FetchPolicy) -> Self {
        Self {
            transport,
            domains,
            policy,
        }
    }

    /// Fetches `url`, retrying timeouts, transport errors and 5xx
    ///
    /// 4xx responses are returned immediately. Never fails; see
    /// [`FetchOutcome`].
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let domain = extract_domain(url).unwrap_or_default();
        let mut attempt = 0;

        loop {
            self.wait_for_slot(&domain).await;
            let result = self.transport.get(url.as_str()).await;

            let retryable = match &result {
                Ok(response) => response.status >= 500,
                Err(_) => true,
            };

            if retryable && attempt < self.policy.max_retries {
                let delay = self.policy.backoff(attempt);
                match &result {
                    Ok(response) => tracing::warn!(
                        "HTTP {} from {}, retry {}/{} in {:?}",
                        response.status,
                        url,
                        attempt + 1,
                        self.policy.max_retries,
                        delay
                    ),
                    Err(e) => tracing::warn!(
                        "{} for {}, retry {}/{} in {:?}",
                        e,
                        url,
                        attempt + 1,
                        self.policy.max_retries,
                        delay
                    ),
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let attempts = attempt + 1;
            return match result {
                Ok(response) => FetchOutcome::from_response(response, attempts),
                Err(e) => FetchOutcome::from_error(e, attempts),
            };
        }
    }

    async fn wait_for_slot(&self, domain: &str) {
        let wait = self.domains.reserve_slot(domain, self.policy.rate_limit);
        if wait.is_zero() {
            return;
        }

        let jitter = random_up_to((self.policy.rate_limit / 10).min(MAX_RATE_LIMIT_JITTER));
        tracing::debug!("Rate limiting {}: waiting {:?}", domain, wait + jitter);
        tokio::time::sleep(wait + jitter).await;
    }
}

/// Fixed set of fetchers handed out round-robin
pub struct FetcherPool {
    fetchers: Vec<Fetcher>,
    next: AtomicUsize,
}

impl FetcherPool {
    /// `clamp(workers / 10, 1, cap)`
    pub fn pool_size(max_workers: usize, cap: usize) -> usize {
        (max_workers / 10).clamp(1, cap.max(1))
    }

    /// One `reqwest` session per pool slot
    pub fn http(config: &Config, domains: Arc<DomainRegistry>) -> Result<Self, reqwest::Error> {
        let size = Self::pool_size(config.crawler.max_workers, config.http.fetcher_pool_cap);
        let policy = FetchPolicy::from_config(&config.crawler);

        let fetchers = (0..size)
            .map(|_| {
                let transport = HttpTransport::new(&config.http, config.crawler.timeout())?;
                Ok(Fetcher::new(Arc::new(transport), domains.clone(), policy))
            })
            .collect::<Result<Vec<_>, reqwest::Error>>()?;

        tracing::debug!("Built fetcher pool with {} sessions", size);
        Ok(Self::with_fetchers(fetchers))
    }

    /// A pool over caller-supplied transports
    ///
    /// Returns None for an empty list.
    pub fn from_transports(
        transports: Vec<Arc<dyn Transport>>,
        domains: Arc<DomainRegistry>,
        policy: FetchPolicy,
    ) -> Option<Self> {
        if transports.is_empty() {
            return None;
        }
        let fetchers = transports
            .into_iter()
            .map(|transport| Fetcher::new(transport, domains.clone(), policy))
            .collect();
        Some(Self::with_fetchers(fetchers))
    }

    fn with_fetchers(fetchers: Vec<Fetcher>) -> Self {
        Self {
            fetchers,
            next: AtomicUsize::new(0),
        }
    }

    /// The next fetcher in rotation
    pub fn get(&self) -> &Fetcher {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.fetchers.len();
        &self.fetchers[index]
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Replays canned results and records when each request was sent
    struct Scripted {
        replies: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        sent: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Instant> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn get(&self, _url: &str) -> Result<RawResponse, TransportError> {
            self.sent.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status(200)))
        }
    }

    fn status(code: u16) -> RawResponse {
        RawResponse {
            status: code,
            body: if code == 200 { "<html></html>".to_string() } else { String::new() },
            content_type: Some("text/html".to_string()),
            ..RawResponse::default()
        }
    }

    fn policy(retry_ms: u64, max_retries: u32) -> FetchPolicy {
        FetchPolicy {
            rate_limit: Duration::ZERO,
            retry_base: Duration::from_millis(retry_ms),
            max_retries,
        }
    }

    fn fetcher(transport: Arc<Scripted>, policy: FetchPolicy) -> Fetcher {
        Fetcher::new(transport, Arc::new(DomainRegistry::new()), policy)
    }

    fn url() -> Url {
        Url::parse("https://x.test/").unwrap()
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let transport = Scripted::new(vec![Ok(status(200))]);
        let outcome = fetcher(transport.clone(), policy(10, 3)).fetch(&url()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.retry_count(), 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let transport = Scripted::new(vec![Ok(status(503)), Ok(status(502)), Ok(status(200))]);
        let outcome = fetcher(transport.clone(), policy(5, 3)).fetch(&url()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let transport = Scripted::new(vec![Ok(status(404))]);
        let outcome = fetcher(transport.clone(), policy(5, 3)).fetch(&url()).await;

        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.error.as_deref(), Some("HTTP 404"));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_last_status() {
        let transport = Scripted::new(vec![Ok(status(500)), Ok(status(500)), Ok(status(500))]);
        let outcome = fetcher(transport.clone(), policy(20, 2)).fetch(&url()).await;

        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.retry_count(), 2);
        assert!(outcome.error.is_some());

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[1] - sent[0] >= Duration::from_millis(20));
        assert!(sent[2] - sent[1] >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_synthetic_status() {
        let transport = Scripted::new(vec![Err(TransportError::Timeout), Err(TransportError::Timeout)]);
        let outcome = fetcher(transport, policy(1, 1)).fetch(&url()).await;

        assert_eq!(outcome.status, TIMEOUT_STATUS);
        assert!(outcome.body.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("Request timeout"));
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_connect_error_is_retried() {
        let transport = Scripted::new(vec![
            Err(TransportError::Connect("refused".to_string())),
            Ok(status(200)),
        ]);
        let outcome = fetcher(transport, policy(1, 2)).fetch(&url()).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_connect_error_without_retries() {
        let transport = Scripted::new(vec![Err(TransportError::Connect("refused".to_string()))]);
        let outcome = fetcher(transport, policy(1, 0)).fetch(&url()).await;
        assert_eq!(outcome.status, TRANSPORT_FAILURE_STATUS);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_rate_limit_shared_across_pool() {
        let a = Scripted::new(vec![]);
        let b = Scripted::new(vec![]);
        let pool = FetcherPool::from_transports(
            vec![a.clone() as Arc<dyn Transport>, b.clone()],
            Arc::new(DomainRegistry::new()),
            FetchPolicy {
                rate_limit: Duration::from_millis(50),
                retry_base: Duration::from_millis(1),
                max_retries: 0,
            },
        )
        .unwrap();

        pool.get().fetch(&url()).await;
        pool.get().fetch(&url()).await;

        let first = a.sent()[0];
        let second = b.sent()[0];
        assert!(second - first >= Duration::from_millis(50));
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(FetcherPool::pool_size(1, 5), 1);
        assert_eq!(FetcherPool::pool_size(10, 5), 1);
        assert_eq!(FetcherPool::pool_size(30, 5), 3);
        assert_eq!(FetcherPool::pool_size(500, 5), 5);
        assert_eq!(FetcherPool::pool_size(500, 0), 1);
    }

    #[tokio::test]
    async fn test_pool_round_robin() {
        let transports: Vec<Arc<Scripted>> = (0..3).map(|_| Scripted::new(vec![])).collect();
        let pool = FetcherPool::from_transports(
            transports.iter().map(|t| t.clone() as Arc<dyn Transport>).collect(),
            Arc::new(DomainRegistry::new()),
            policy(1, 0),
        )
        .unwrap();
        assert_eq!(pool.len(), 3);

        for _ in 0..6 {
            pool.get().fetch(&url()).await;
        }
        for transport in &transports {
            assert_eq!(transport.sent().len(), 2);
        }
    }

    #[test]
    fn test_empty_pool_refused() {
        assert!(FetcherPool::from_transports(vec![], Arc::new(DomainRegistry::new()), policy(1, 0))
            .is_none());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy(100, 3);
        let first = policy.backoff(0);
        let second = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(210));
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default(), Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
