//! Crawl workers
//!
//! Each worker loops over the frontier until it is drained, closed, or
//! stays empty for the idle timeout. Per task the worker:
//! 1. Claims the URL in the visitation ledger (losers drop the task)
//! 2. Applies the loop heuristic and the domain policy
//! 3. Fetches through the pool, retrying per the fetch policy
//! 4. Parses successful bodies on the blocking pool
//! 5. Pushes the PageResult to the result sink
//! 6. Queues admissible children one level deeper
//! 7. Releases the claim

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchOutcome, FetcherPool};
use crate::crawler::frontier::{CrawlTask, Frontier, TaskGuard};
use crate::crawler::parser::{ContentParser, ParsedContent};
use crate::crawler::sink::{ResultSink, SinkItem};
use crate::output::stats::CrawlStats;
use crate::state::{DomainPolicy, DomainRegistry, TaskProgress, TaskStage, VisitationLedger};
use crate::storage::PageResult;
use crate::url::{extract_domain, is_loop_trap, is_same_domain, UrlFilter};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;
use uuid::Uuid;

/// Per-run knobs the workers consult
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_depth: u32,
    pub allow_cross_domain: bool,
    pub enable_loop_prevention: bool,
    pub max_repeated_segments: usize,
    pub domain_policy: DomainPolicy,
    pub idle_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            allow_cross_domain: config.allow_cross_domain,
            enable_loop_prevention: config.enable_loop_prevention,
            max_repeated_segments: config.max_repeated_segments,
            domain_policy: config.domain_policy,
            idle_timeout: config.idle_wait(),
        }
    }
}

/// Everything a worker shares with its siblings
pub struct WorkerContext {
    pub run_id: String,
    pub frontier: Arc<Frontier>,
    pub ledger: Arc<VisitationLedger>,
    pub domains: Arc<DomainRegistry>,
    pub fetchers: Arc<FetcherPool>,
    pub parser: Arc<dyn ContentParser>,
    pub filter: UrlFilter,
    pub semaphore: Arc<Semaphore>,
    pub sink: ResultSink,
    pub stats: Arc<CrawlStats>,
    pub settings: WorkerSettings,
}

/// Runs one worker until the frontier has nothing more for it
///
/// Returns the number of tasks this worker dequeued.
pub async fn run_worker(id: usize, ctx: Arc<WorkerContext>) -> u64 {
    let mut handled = 0;

    while let Some(task) = ctx.frontier.next(ctx.settings.idle_timeout).await {
        let _done = TaskGuard::new(&ctx.frontier);
        handled += 1;

        let Ok(_permit) = ctx.semaphore.acquire().await else {
            tracing::warn!("Worker {}: fetch semaphore closed", id);
            break;
        };

        ctx.process(task).await;
    }

    tracing::debug!("Worker {} exiting after {} tasks", id, handled);
    handled
}

impl WorkerContext {
    /// Takes one task from claim to release
    ///
    /// Returns the stage the task ended in, or None when another worker
    /// already owned the URL.
    pub async fn process(&self, task: CrawlTask) -> Option<TaskStage> {
        let Some(claim) = self.ledger.claim(&task.url) else {
            tracing::debug!("Skipping {}: already claimed", task.url);
            return None;
        };
        let mut progress = TaskProgress::claimed();

        let url = match Url::parse(claim.key()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Rejecting {}: {}", task.url, e);
                return Some(self.reject(&mut progress));
            }
        };
        let domain = extract_domain(&url).unwrap_or_default();

        if self.settings.enable_loop_prevention
            && is_loop_trap(&url, self.settings.max_repeated_segments)
        {
            tracing::debug!("Rejecting {}: repeated path segments", url);
            return Some(self.reject(&mut progress));
        }

        if !self.domains.admit(&domain, self.settings.domain_policy) {
            tracing::debug!("Rejecting {}: domain {} already visited", url, domain);
            return Some(self.reject(&mut progress));
        }

        progress.advance(TaskStage::Fetching);
        self.stats.task_started();
        let started = Instant::now();

        let outcome = self.fetchers.get().fetch(&url).await;

        let parsed = if outcome.is_success() && !outcome.body.is_empty() {
            progress.advance(TaskStage::Parsing);
            self.parse(&outcome, &url).await
        } else {
            ParsedContent::default()
        };

        let page_id = Uuid::new_v4().to_string();
        let result = self.page_result(&task, &page_id, &domain, &outcome, &parsed);
        let success = result.is_success();
        self.stats.task_finished(success, started.elapsed());

        if success {
            tracing::debug!("Fetched {} ({} links)", url, parsed.links.len());
        } else {
            tracing::warn!(
                "Failed {}: {}",
                url,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        let expand = success && task.depth < self.settings.max_depth;
        let links = if expand { parsed.links.clone() } else { Vec::new() };

        if !self.sink.push(SinkItem {
            result,
            body: outcome.body,
            parsed,
        }) {
            tracing::error!("Result sink closed; page {} not persisted", url);
        }

        if expand {
            progress.advance(TaskStage::ChildEnqueue);
            let queued = self.enqueue_children(&task, &page_id, &domain, &links);
            tracing::debug!("Queued {} of {} links from {}", queued, links.len(), url);
        }

        let end = if success {
            TaskStage::Resolved
        } else {
            TaskStage::Failed
        };
        progress.advance(end);

        drop(claim);
        Some(progress.stage())
    }

    fn reject(&self, progress: &mut TaskProgress) -> TaskStage {
        progress.advance(TaskStage::Rejected);
        self.stats.task_skipped();
        TaskStage::Rejected
    }

    /// Runs the content parser off the async threads
    ///
    /// Parser errors and panics both yield an empty result.
    async fn parse(&self, outcome: &FetchOutcome, url: &Url) -> ParsedContent {
        let parser = Arc::clone(&self.parser);
        let body = outcome.body.clone();
        let content_type = outcome.content_type.clone();
        let page_url = url.clone();

        let joined = tokio::task::spawn_blocking(move || {
            parser.parse(&body, &page_url, content_type.as_deref())
        })
        .await;

        match joined {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                tracing::warn!("Parser error for {}: {}", url, e);
                ParsedContent::default()
            }
            Err(e) => {
                tracing::warn!("Parser task failed for {}: {}", url, e);
                ParsedContent::default()
            }
        }
    }

    fn page_result(
        &self,
        task: &CrawlTask,
        page_id: &str,
        domain: &str,
        outcome: &FetchOutcome,
        parsed: &ParsedContent,
    ) -> PageResult {
        let content_length = if parsed.content_length > 0 {
            parsed.content_length
        } else {
            outcome.body.len() as u64
        };

        PageResult {
            page_id: page_id.to_string(),
            run_id: self.run_id.clone(),
            url: task.url.clone(),
            domain: domain.to_string(),
            status_code: outcome.status,
            depth: task.depth,
            parent_page_id: task.parent_page_id.clone(),
            referer_url: task.referer_url.clone(),
            content_hash: parsed.content_hash.clone(),
            title: parsed.title.clone(),
            meta_description: parsed.meta_description.clone(),
            content_type: outcome.content_type.clone(),
            content_length,
            error_message: outcome.error.clone(),
            retry_count: outcome.retry_count(),
        }
    }

    /// Filters discovered links and queues the survivors at `depth + 1`
    ///
    /// Returns how many were accepted by the frontier.
    fn enqueue_children(
        &self,
        task: &CrawlTask,
        page_id: &str,
        parent_domain: &str,
        links: &[String],
    ) -> usize {
        let mut seen = HashSet::new();
        let mut queued = 0;

        for link in links {
            let child = match self.filter.admit(link) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Dropping link {}: {}", link, e);
                    continue;
                }
            };

            let key = child.to_string();
            if !seen.insert(key.clone()) || self.ledger.is_known(&key) {
                continue;
            }

            if !self.settings.allow_cross_domain {
                let child_domain = extract_domain(&child).unwrap_or_default();
                if !is_same_domain(parent_domain, &child_domain) {
                    tracing::debug!("Dropping cross-domain link {}", key);
                    continue;
                }
            }

            if self
                .frontier
                .enqueue(CrawlTask::child(key, task.depth, page_id, &task.url))
            {
                queued += 1;
            }
        }

        queued
    }
}
