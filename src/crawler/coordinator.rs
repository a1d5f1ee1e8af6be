//! Crawler coordinator - run lifecycle orchestration
//!
//! This module drives one crawl run from start to finish:
//! - Creating the run record and loading seeds
//! - Seeding the frontier and starting workers, the result sink and the
//!   stats reporter
//! - Waiting for the frontier to drain (or for cancellation)
//! - Tearing everything down and recording the terminal run status

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::FetcherPool;
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::parser::{ContentParser, HtmlContentParser};
use crate::crawler::sink::spawn_sink;
use crate::crawler::worker::{run_worker, WorkerContext, WorkerSettings};
use crate::input::{SeedSource, UrlEntry};
use crate::output::stats::{spawn_reporter, CrawlStats, FinalStats};
use crate::state::{DomainRegistry, VisitationLedger};
use crate::storage::{lock_storage, open_storage, DiskFileStore, FileStore, SharedStorage};
use crate::url::UrlFilter;
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Message recorded on runs stopped through a [`ShutdownHandle`]
pub const CANCELLED_MESSAGE: &str = "crawl cancelled";

/// Per-run bounds on the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Cap on tasks ever queued; `None` for uncapped
    pub max_pages: Option<usize>,
    pub max_depth: u32,
}

impl CrawlLimits {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_pages: config.page_cap(),
            max_depth: config.max_depth,
        }
    }
}

/// Requests cancellation of the coordinator's current or next run
///
/// The request is consumed by that run; later runs start uncancelled.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stops new claims; in-flight pages finish and are persisted
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// How a run's crawl phase ended
enum RunEnd {
    Drained,
    Cancelled,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: CrawlerConfig,
    storage: SharedStorage,
    files: Arc<dyn FileStore>,
    fetchers: Arc<FetcherPool>,
    parser: Arc<dyn ContentParser>,
    shutdown: Arc<watch::Sender<bool>>,
    last_stats: Option<FinalStats>,
}

impl Coordinator {
    /// Creates a coordinator over explicit collaborators
    pub fn new(
        config: CrawlerConfig,
        storage: SharedStorage,
        files: Arc<dyn FileStore>,
        fetchers: FetcherPool,
    ) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            config,
            storage,
            files,
            fetchers: Arc::new(fetchers),
            parser: Arc::new(HtmlContentParser),
            shutdown: Arc::new(tx),
            last_stats: None,
        }
    }

    /// Creates the production stack: SQLite storage, disk content store and
    /// a pool of HTTP sessions
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to open storage or build HTTP clients
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let shared: SharedStorage = Arc::new(Mutex::new(storage));
        let files = Arc::new(DiskFileStore::new(&config.output.content_dir));
        let fetchers = FetcherPool::http(config, Arc::new(DomainRegistry::new()))?;

        Ok(Self::new(config.crawler.clone(), shared, files, fetchers))
    }

    /// Replaces the content parser
    pub fn with_parser(mut self, parser: Arc<dyn ContentParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Statistics of the most recent run that got as far as crawling
    pub fn last_stats(&self) -> Option<&FinalStats> {
        self.last_stats.as_ref()
    }

    /// Runs one crawl to its terminal status
    ///
    /// # Returns
    ///
    /// * `Ok(run_id)` - The run completed (possibly with failed pages)
    /// * `Err(CrawlError::RunFailed)` - The run was marked failed
    /// * `Err(_)` - The run record itself could not be written
    pub async fn run(&mut self, source: &dyn SeedSource, limits: CrawlLimits) -> Result<String> {
        let run_id = Uuid::new_v4().to_string();
        let input_ref = source.describe();

        lock_storage(&self.storage).create_run(&run_id, &input_ref, limits.max_depth)?;
        tracing::info!("Starting crawl run {} from {}", run_id, input_ref);

        let end = self.execute(&run_id, source, limits).await;
        // A request applies to one run only.
        self.shutdown.send_replace(false);

        let failure = match end {
            Ok(RunEnd::Drained) => None,
            Ok(RunEnd::Cancelled) => Some(CANCELLED_MESSAGE.to_string()),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                lock_storage(&self.storage).mark_completed(&run_id)?;
                tracing::info!("Crawl run {} completed", run_id);
                Ok(run_id)
            }
            Some(message) => {
                lock_storage(&self.storage).mark_failed(&run_id, &message)?;
                tracing::error!("Crawl run {} failed: {}", run_id, message);
                Err(CrawlError::RunFailed { run_id, message })
            }
        }
    }

    async fn execute(
        &mut self,
        run_id: &str,
        source: &dyn SeedSource,
        limits: CrawlLimits,
    ) -> Result<RunEnd> {
        let filter = UrlFilter::new(self.config.allow_private_hosts);
        let seeds = prepare_seeds(source.seed_urls().await?, &filter, limits.max_pages);

        if seeds.is_empty() {
            tracing::info!("No seed URLs for run {}; nothing to crawl", run_id);
            return Ok(RunEnd::Drained);
        }

        lock_storage(&self.storage).update_total_urls(run_id, seeds.len() as u64)?;

        if *self.shutdown.borrow() {
            tracing::warn!("Shutdown requested before run {} started crawling", run_id);
            return Ok(RunEnd::Cancelled);
        }

        let frontier = Arc::new(Frontier::new(limits.max_depth, limits.max_pages));
        for seed in seeds {
            frontier.enqueue(CrawlTask::seed(seed));
        }
        tracing::info!(
            "Seeded frontier with {} URLs (max depth {}, max pages {})",
            frontier.size(),
            limits.max_depth,
            limits
                .max_pages
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );

        let ledger = Arc::new(VisitationLedger::new());
        let stats = Arc::new(CrawlStats::new());
        let (sink, sink_handle) = spawn_sink(Arc::clone(&self.storage), Arc::clone(&self.files));

        let mut settings = WorkerSettings::from_config(&self.config);
        settings.max_depth = limits.max_depth;

        let workers = self.config.max_workers.max(1);
        let ctx = Arc::new(WorkerContext {
            run_id: run_id.to_string(),
            frontier: Arc::clone(&frontier),
            ledger: Arc::clone(&ledger),
            domains: Arc::new(DomainRegistry::new()),
            fetchers: Arc::clone(&self.fetchers),
            parser: Arc::clone(&self.parser),
            filter,
            semaphore: Arc::new(Semaphore::new(workers)),
            sink,
            stats: Arc::clone(&stats),
            settings,
        });

        let reporter = spawn_reporter(
            Arc::clone(&stats),
            Arc::clone(&frontier),
            Arc::clone(&ledger),
            self.config.stats_period(),
        );

        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(run_worker(id, Arc::clone(&ctx)));
        }
        // Workers own the remaining sink handles; the consumer stops once they exit.
        drop(ctx);

        let mut shutdown = self.shutdown.subscribe();
        let end = tokio::select! {
            _ = frontier.wait_drained() => RunEnd::Drained,
            _ = cancelled(&mut shutdown) => RunEnd::Cancelled,
        };

        if matches!(end, RunEnd::Cancelled) {
            tracing::warn!("Cancelling crawl run {}", run_id);
            frontier.close();
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        reporter.abort();

        let summary = sink_handle.await?;
        if summary.storage_errors > 0 || summary.content_errors > 0 {
            tracing::warn!(
                "Run {}: {} page results and {} content saves failed to persist",
                run_id,
                summary.storage_errors,
                summary.content_errors
            );
        }

        let final_stats = stats.final_stats();
        final_stats.log();
        self.last_stats = Some(final_stats);

        Ok(end)
    }
}

/// Resolves once shutdown has been requested
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Normalizes, filters and deduplicates seeds, then applies the page cap
fn prepare_seeds(entries: Vec<UrlEntry>, filter: &UrlFilter, max_pages: Option<usize>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut seeds: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| match filter.admit(&entry.url) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::debug!("Skipping seed {}: {}", entry.url, e);
                None
            }
        })
        .filter(|url| seen.insert(url.clone()))
        .collect();

    if let Some(cap) = max_pages {
        if seeds.len() > cap {
            tracing::info!("Truncating {} seeds to the page cap of {}", seeds.len(), cap);
            seeds.truncate(cap);
        }
    }
    seeds
}

/// Runs a crawl with the production collaborators described by `config`
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `source` - Where the seed URLs come from
/// * `limits` - Page cap and depth for this run
///
/// # Returns
///
/// * `Ok(run_id)` - Crawl completed
/// * `Err(CrawlError)` - Crawl failed
pub async fn run_crawl(config: &Config, source: &dyn SeedSource, limits: CrawlLimits) -> Result<String> {
    let mut coordinator = Coordinator::from_config(config)?;
    coordinator.run(source, limits).await
}
