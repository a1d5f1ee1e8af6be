//! Live crawl statistics
//!
//! Workers bump the counters in [`CrawlStats`]; a background reporter logs
//! periodic snapshots, and the coordinator turns the counters into
//! [`FinalStats`] when the run ends.

use crate::crawler::Frontier;
use crate::state::VisitationLedger;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Counters shared by every worker of one run
#[derive(Debug)]
pub struct CrawlStats {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicU64,
    processing_micros: AtomicU64,
    started: Instant,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self {
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            processing_micros: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker began fetching a claimed task
    pub fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetched task produced its PageResult
    pub fn task_finished(&self, success: bool, elapsed: Duration) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// A claimed task was rejected before fetching
    pub fn task_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Mean time from fetch start to PageResult
    pub fn average_processing_time(&self) -> Duration {
        let processed = self.processed();
        if processed == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.processing_micros.load(Ordering::Relaxed) / processed)
    }

    /// Processed pages per second since the run started
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.processed() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn final_stats(&self) -> FinalStats {
        let processed = self.processed();
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let success_rate = if processed > 0 {
            (succeeded as f64 / processed as f64) * 100.0
        } else {
            0.0
        };

        FinalStats {
            processed,
            succeeded,
            failed: self.failed(),
            skipped: self.skipped.load(Ordering::Relaxed),
            success_rate,
            elapsed: self.elapsed(),
            throughput: self.throughput(),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct FinalStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Claimed but rejected before fetching
    pub skipped: u64,
    /// Percentage of processed pages that succeeded
    pub success_rate: f64,
    pub elapsed: Duration,
    /// Pages per second
    pub throughput: f64,
}

impl FinalStats {
    pub fn log(&self) {
        tracing::info!(
            "Crawl finished: {} processed, {} succeeded, {} failed, {} skipped ({:.1}% success) in {:.1}s, {:.2} pages/sec",
            self.processed,
            self.succeeded,
            self.failed,
            self.skipped,
            self.success_rate,
            self.elapsed.as_secs_f64(),
            self.throughput
        );
    }
}

/// Logs a snapshot every `interval` until aborted
pub fn spawn_reporter(
    stats: Arc<CrawlStats>,
    frontier: Arc<Frontier>,
    ledger: Arc<VisitationLedger>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            tracing::info!(
                "Progress: {} processed, {} failed, {} workers busy, {} queued, {} URLs seen, avg {:?}/page, {:.2} pages/sec",
                stats.processed(),
                stats.failed(),
                stats.in_flight(),
                frontier.size(),
                ledger.visited_count(),
                stats.average_processing_time(),
                stats.throughput()
            );
        }
    })
}
