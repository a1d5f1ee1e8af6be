//! Result sink: persistence off the crawl hot path
//!
//! Workers push finished pages onto an unbounded channel; one consumer task
//! stores each page result and, for successful pages with a body, saves the
//! content files. Storage failures are logged and never stop the consumer.

use crate::crawler::ParsedContent;
use crate::storage::{lock_storage, FileStore, PageResult, SharedStorage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One finished page on its way to storage
#[derive(Debug, Clone)]
pub struct SinkItem {
    pub result: PageResult,
    /// Raw body; empty for failed fetches
    pub body: String,
    pub parsed: ParsedContent,
}

/// Producer handle held by each worker
#[derive(Debug, Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<SinkItem>,
}

impl ResultSink {
    /// Queues a page for persistence
    ///
    /// Returns false if the consumer has already gone away.
    pub fn push(&self, item: SinkItem) -> bool {
        self.tx.send(item).is_ok()
    }
}

/// What the consumer did over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub pages_stored: u64,
    pub storage_errors: u64,
    pub content_saved: u64,
    pub content_errors: u64,
}

/// Starts the consumer task
///
/// The consumer runs until every [`ResultSink`] clone is dropped, then drains
/// whatever is still queued and returns its summary.
pub fn spawn_sink(
    storage: SharedStorage,
    files: Arc<dyn FileStore>,
) -> (ResultSink, JoinHandle<SinkSummary>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<SinkItem>();

    let handle = tokio::spawn(async move {
        let mut summary = SinkSummary::default();

        while let Some(item) = rx.recv().await {
            persist(&storage, files.as_ref(), item, &mut summary).await;
        }

        tracing::debug!(
            "Result sink drained: {} pages stored, {} storage errors, {} content saves, {} content errors",
            summary.pages_stored,
            summary.storage_errors,
            summary.content_saved,
            summary.content_errors
        );
        summary
    });

    (ResultSink { tx }, handle)
}

async fn persist(
    storage: &SharedStorage,
    files: &dyn FileStore,
    item: SinkItem,
    summary: &mut SinkSummary,
) {
    let SinkItem {
        result,
        body,
        parsed,
    } = item;

    let stored = lock_storage(storage).store_page(&result);
    match stored {
        Ok(()) => summary.pages_stored += 1,
        Err(e) => {
            summary.storage_errors += 1;
            tracing::error!("Failed to store page result for {}: {}", result.url, e);
        }
    }

    if !result.is_success() || body.is_empty() {
        return;
    }

    match files
        .save_content(&result.page_id, &result.url, &body, &parsed)
        .await
    {
        Ok(_) => summary.content_saved += 1,
        Err(e) => {
            summary.content_errors += 1;
            tracing::error!("Failed to save content for {}: {}", result.url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ContentPaths, SqliteStorage, Storage, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FailingFiles;

    #[async_trait]
    impl FileStore for FailingFiles {
        async fn save_content(
            &self,
            _page_id: &str,
            _url: &str,
            _body: &str,
            _parsed: &ParsedContent,
        ) -> StorageResult<ContentPaths> {
            Err(StorageError::Database("disk full".to_string()))
        }
    }

    fn page(id: &str, status: u16) -> PageResult {
        PageResult {
            page_id: id.to_string(),
            run_id: "run-1".to_string(),
            url: format!("https://x.test/{}", id),
            domain: "x.test".to_string(),
            status_code: status,
            depth: 0,
            parent_page_id: None,
            referer_url: None,
            content_hash: None,
            title: None,
            meta_description: None,
            content_type: None,
            content_length: 0,
            error_message: (status != 200).then(|| format!("HTTP {}", status)),
            retry_count: 0,
        }
    }

    fn storage() -> (Arc<Mutex<SqliteStorage>>, SharedStorage) {
        let mut sqlite = SqliteStorage::open_in_memory().unwrap();
        sqlite.create_run("run-1", "test", 1).unwrap();
        let concrete = Arc::new(Mutex::new(sqlite));
        let shared: SharedStorage = concrete.clone();
        (concrete, shared)
    }

    #[tokio::test]
    async fn test_sink_drains_after_senders_drop() {
        let (concrete, shared) = storage();
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(crate::storage::DiskFileStore::new(dir.path()));

        let (sink, handle) = spawn_sink(shared, files);
        for i in 0..5 {
            assert!(sink.push(SinkItem {
                result: page(&format!("p{}", i), 200),
                body: "<html></html>".to_string(),
                parsed: ParsedContent::default(),
            }));
        }
        drop(sink);

        let summary = handle.await.unwrap();
        assert_eq!(summary.pages_stored, 5);
        assert_eq!(summary.content_saved, 5);
        assert_eq!(concrete.lock().unwrap().count_pages("run-1").unwrap(), 5);
        assert!(dir.path().join("p0").join("raw.html").exists());
    }

    #[tokio::test]
    async fn test_failed_pages_skip_content() {
        let (_concrete, shared) = storage();
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(crate::storage::DiskFileStore::new(dir.path()));

        let (sink, handle) = spawn_sink(shared, files);
        sink.push(SinkItem {
            result: page("bad", 500),
            body: String::new(),
            parsed: ParsedContent::default(),
        });
        drop(sink);

        let summary = handle.await.unwrap();
        assert_eq!(summary.pages_stored, 1);
        assert_eq!(summary.content_saved, 0);
        assert!(!dir.path().join("bad").exists());
    }

    #[tokio::test]
    async fn test_file_errors_do_not_stop_consumer() {
        let (concrete, shared) = storage();
        let (sink, handle) = spawn_sink(shared, Arc::new(FailingFiles));

        for id in ["a", "b"] {
            sink.push(SinkItem {
                result: page(id, 200),
                body: "body".to_string(),
                parsed: ParsedContent::default(),
            });
        }
        drop(sink);

        let summary = handle.await.unwrap();
        assert_eq!(summary.content_errors, 2);
        assert_eq!(summary.pages_stored, 2);
        assert_eq!(concrete.lock().unwrap().count_pages("run-1").unwrap(), 2);
    }
}
