//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PageRecord, PageResult, RunRecord};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage handle shared between the run controller and the result sink
pub type SharedStorage = Arc<Mutex<dyn Storage>>;

/// Locks a shared storage handle, recovering from a poisoned lock
pub fn lock_storage(storage: &SharedStorage) -> MutexGuard<'_, dyn Storage + 'static> {
    storage.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trait for storage backend implementations
///
/// Every call is independent; page IDs are unique per task so storing the
/// same result twice is harmless.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a run record with status `running`
    fn create_run(&mut self, run_id: &str, input_ref: &str, max_depth: u32) -> StorageResult<()>;

    /// Records the number of seed URLs for a running run
    fn update_total_urls(&mut self, run_id: &str, total: u64) -> StorageResult<()>;

    /// Moves a running run to `completed`
    ///
    /// Returns false (and changes nothing) when the run is already terminal.
    fn mark_completed(&mut self, run_id: &str) -> StorageResult<bool>;

    /// Moves a running run to `failed` with `message`
    ///
    /// Returns false (and changes nothing) when the run is already terminal.
    fn mark_failed(&mut self, run_id: &str, message: &str) -> StorageResult<bool>;

    /// Gets a run by ID
    fn get_run(&self, run_id: &str) -> StorageResult<RunRecord>;

    /// Most recent runs first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Page Results =====

    /// Persists one page result
    fn store_page(&mut self, page: &PageResult) -> StorageResult<()>;

    /// All page results of a run in insertion order
    fn pages_for_run(&self, run_id: &str) -> StorageResult<Vec<PageRecord>>;

    /// Number of page results stored for a run
    fn count_pages(&self, run_id: &str) -> StorageResult<u64>;
}
