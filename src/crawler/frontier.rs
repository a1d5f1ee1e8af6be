//! Frontier queue for pending crawl tasks
//!
//! The frontier is an unbounded FIFO shared by every worker. Alongside the
//! queue it tracks:
//! - `total_queued`, the number of tasks ever accepted (bounded by the page cap)
//! - `pending`, tasks accepted but not yet completed (queued or in flight)
//!
//! The crawl is drained when the queue is empty and `pending` is zero.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// One unit of crawl work
///
/// Immutable once enqueued. `parent_page_id` is a back-reference to the
/// page the URL was discovered on; seeds have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: String,
    pub depth: u32,
    pub parent_page_id: Option<String>,
    pub referer_url: Option<String>,
}

impl CrawlTask {
    /// A depth-0 task with no parent
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            parent_page_id: None,
            referer_url: None,
        }
    }

    /// A task discovered on the page `parent_page_id` at `parent_url`
    pub fn child(
        url: impl Into<String>,
        parent_depth: u32,
        parent_page_id: &str,
        parent_url: &str,
    ) -> Self {
        Self {
            url: url.into(),
            depth: parent_depth + 1,
            parent_page_id: Some(parent_page_id.to_string()),
            referer_url: Some(parent_url.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<CrawlTask>,
    total_queued: usize,
    pending: usize,
    closed: bool,
}

impl FrontierState {
    fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.pending == 0
    }
}

/// Shared queue of crawl tasks with drain detection
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    task_ready: Notify,
    drained: Notify,
    max_depth: u32,
    max_pages: Option<usize>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// `max_pages = None` leaves the total number of tasks uncapped.
    pub fn new(max_depth: u32, max_pages: Option<usize>) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            task_ready: Notify::new(),
            drained: Notify::new(),
            max_depth,
            max_pages,
        }
    }

    fn state(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task
    ///
    /// Refused (returns false) when the task is deeper than `max_depth`,
    /// the page cap is reached, or the frontier was closed.
    pub fn enqueue(&self, task: CrawlTask) -> bool {
        if task.depth > self.max_depth {
            tracing::debug!("Not queueing {} at depth {}: too deep", task.url, task.depth);
            return false;
        }

        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            if let Some(cap) = self.max_pages {
                if state.total_queued >= cap {
                    tracing::debug!("Not queueing {}: page cap of {} reached", task.url, cap);
                    return false;
                }
            }
            state.total_queued += 1;
            state.pending += 1;
            state.queue.push_back(task);
        }

        self.task_ready.notify_one();
        true
    }

    /// Takes the next task, waiting up to `idle_timeout` for one to appear
    ///
    /// Returns None once the frontier is drained or closed, or when nothing
    /// arrived within the wait. Every task handed out must be matched by one
    /// call to [`Frontier::complete`].
    pub async fn next(&self, idle_timeout: Duration) -> Option<CrawlTask> {
        let deadline = tokio::time::Instant::now() + idle_timeout;

        loop {
            let notified = self.task_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.queue.pop_front() {
                    return Some(task);
                }
                if state.is_drained() {
                    return None;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Marks one handed-out task as finished
    pub fn complete(&self) {
        let drained = {
            let mut state = self.state();
            state.pending = state.pending.saturating_sub(1);
            state.is_drained()
        };

        if drained {
            self.drained.notify_waiters();
            // Wake idle workers so they can observe the drain and exit.
            self.task_ready.notify_waiters();
        }
    }

    /// Resolves once the frontier is drained or closed
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state();
                if state.closed || state.is_drained() {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Stops handing out and accepting tasks
    ///
    /// Queued tasks are discarded; tasks already in flight still complete.
    pub fn close(&self) {
        {
            let mut state = self.state();
            state.closed = true;
            let dropped = state.queue.len();
            state.queue.clear();
            state.pending = state.pending.saturating_sub(dropped);
        }
        self.task_ready.notify_waiters();
        self.drained.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Tasks waiting in the queue
    pub fn size(&self) -> usize {
        self.state().queue.len()
    }

    /// Empty queue and nothing in flight
    pub fn is_drained(&self) -> bool {
        self.state().is_drained()
    }

    /// Tasks accepted over the lifetime of the frontier
    pub fn total_queued(&self) -> usize {
        self.state().total_queued
    }
}

/// Calls [`Frontier::complete`] when dropped
///
/// Workers hold one per dequeued task so that every exit path, early
/// rejection included, counts toward drain.
pub struct TaskGuard<'a> {
    frontier: &'a Frontier,
}

impl<'a> TaskGuard<'a> {
    pub fn new(frontier: &'a Frontier) -> Self {
        Self { frontier }
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = Frontier::new(3, None);
        assert!(frontier.enqueue(CrawlTask::seed("https://x.test/1")));
        assert!(frontier.enqueue(CrawlTask::seed("https://x.test/2")));
        assert_eq!(frontier.size(), 2);

        assert_eq!(frontier.next(WAIT).await.unwrap().url, "https://x.test/1");
        assert_eq!(frontier.next(WAIT).await.unwrap().url, "https://x.test/2");
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let frontier = Frontier::new(1, None);
        assert!(frontier.enqueue(CrawlTask::child("https://x.test/a", 0, "p", "https://x.test/")));
        assert!(!frontier.enqueue(CrawlTask::child("https://x.test/b", 1, "p", "https://x.test/a")));
        assert_eq!(frontier.total_queued(), 1);
    }

    #[tokio::test]
    async fn test_page_cap() {
        let frontier = Frontier::new(3, Some(2));
        assert!(frontier.enqueue(CrawlTask::seed("https://x.test/1")));
        assert!(frontier.enqueue(CrawlTask::seed("https://x.test/2")));
        assert!(!frontier.enqueue(CrawlTask::seed("https://x.test/3")));
        assert_eq!(frontier.total_queued(), 2);

        // Completing work does not free capacity.
        frontier.next(WAIT).await.unwrap();
        frontier.complete();
        assert!(!frontier.enqueue(CrawlTask::seed("https://x.test/4")));
    }

    #[tokio::test]
    async fn test_drain_requires_completion() {
        let frontier = Frontier::new(3, None);
        assert!(frontier.is_drained());

        frontier.enqueue(CrawlTask::seed("https://x.test/"));
        assert!(!frontier.is_drained());

        let _task = frontier.next(WAIT).await.unwrap();
        assert_eq!(frontier.size(), 0);
        assert!(!frontier.is_drained());

        frontier.complete();
        assert!(frontier.is_drained());
    }

    #[tokio::test]
    async fn test_next_returns_none_when_drained() {
        let frontier = Frontier::new(3, None);
        assert!(frontier.next(Duration::from_secs(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_next_times_out_while_work_in_flight() {
        let frontier = Frontier::new(3, None);
        frontier.enqueue(CrawlTask::seed("https://x.test/"));
        let _task = frontier.next(WAIT).await.unwrap();

        assert!(frontier.next(WAIT).await.is_none());
        assert!(!frontier.is_drained());
    }

    #[tokio::test]
    async fn test_waiting_worker_receives_child() {
        let frontier = Arc::new(Frontier::new(3, None));
        frontier.enqueue(CrawlTask::seed("https://x.test/"));
        let parent = frontier.next(WAIT).await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.next(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.enqueue(CrawlTask::child("https://x.test/a", parent.depth, "p1", &parent.url));
        frontier.complete();

        let child = waiter.await.unwrap().unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_page_id.as_deref(), Some("p1"));
        assert_eq!(child.referer_url.as_deref(), Some("https://x.test/"));
    }

    #[tokio::test]
    async fn test_wait_drained_wakes_on_last_completion() {
        let frontier = Arc::new(Frontier::new(3, None));
        frontier.enqueue(CrawlTask::seed("https://x.test/"));
        let _task = frontier.next(WAIT).await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.wait_drained().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        {
            let _guard = TaskGuard::new(&frontier);
        }

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_discards_queue() {
        let frontier = Frontier::new(3, None);
        frontier.enqueue(CrawlTask::seed("https://x.test/1"));
        frontier.enqueue(CrawlTask::seed("https://x.test/2"));

        frontier.close();
        assert!(frontier.is_closed());
        assert!(frontier.is_drained());
        assert!(frontier.next(WAIT).await.is_none());
        assert!(!frontier.enqueue(CrawlTask::seed("https://x.test/3")));
        frontier.wait_drained().await;
    }
}
