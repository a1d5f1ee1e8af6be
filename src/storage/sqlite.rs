//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PageRecord, PageResult, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str =
    "run_id, input_ref, status, max_depth, total_urls, error_message, created_at, updated_at";

const PAGE_COLUMNS: &str = "id, run_id, url, domain, parent_id, referer_url, status_code, depth,
     content_hash, title, meta_description, content_type, content_length, retry_count,
     last_error, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Applies a terminal transition to a run that is still running
    fn finish_run(
        &mut self,
        run_id: &str,
        status: RunStatus,
        message: Option<&str>,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, error_message = COALESCE(?2, error_message), updated_at = ?3
             WHERE run_id = ?4 AND status = ?5",
            params![
                status.to_db_string(),
                message,
                now,
                run_id,
                RunStatus::Running.to_db_string()
            ],
        )?;

        if changed == 0 {
            // Distinguish "already terminal" from "never existed"
            self.get_run(run_id)?;
        }

        Ok(changed > 0)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        run_id: row.get(0)?,
        input_ref: row.get(1)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(RunStatus::Failed),
        max_depth: row.get(3)?,
        total_urls: row.get::<_, i64>(4)?.max(0) as u64,
        error_message: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        page: PageResult {
            page_id: row.get(0)?,
            run_id: row.get(1)?,
            url: row.get(2)?,
            domain: row.get(3)?,
            parent_page_id: row.get(4)?,
            referer_url: row.get(5)?,
            status_code: row.get(6)?,
            depth: row.get(7)?,
            content_hash: row.get(8)?,
            title: row.get(9)?,
            meta_description: row.get(10)?,
            content_type: row.get(11)?,
            content_length: row.get::<_, i64>(12)?.max(0) as u64,
            retry_count: row.get(13)?,
            error_message: row.get(14)?,
        },
        created_at: row.get(15)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run_id: &str, input_ref: &str, max_depth: u32) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (run_id, input_ref, status, max_depth, total_urls, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![
                run_id,
                input_ref,
                RunStatus::Running.to_db_string(),
                max_depth,
                now
            ],
        )?;
        Ok(())
    }

    fn update_total_urls(&mut self, run_id: &str, total: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET total_urls = ?1, updated_at = ?2 WHERE run_id = ?3 AND status = ?4",
            params![
                i64::try_from(total).unwrap_or(i64::MAX),
                now,
                run_id,
                RunStatus::Running.to_db_string()
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::Database(format!(
                "run {} is not running",
                run_id
            )));
        }
        Ok(())
    }

    fn mark_completed(&mut self, run_id: &str) -> StorageResult<bool> {
        self.finish_run(run_id, RunStatus::Completed, None)
    }

    fn mark_failed(&mut self, run_id: &str, message: &str) -> StorageResult<bool> {
        self.finish_run(run_id, RunStatus::Failed, Some(message))
    }

    fn get_run(&self, run_id: &str) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE run_id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY rowid DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Page Results =====

    fn store_page(&mut self, page: &PageResult) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO pages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                PAGE_COLUMNS
            ),
            params![
                page.page_id,
                page.run_id,
                page.url,
                page.domain,
                page.parent_page_id,
                page.referer_url,
                page.status_code,
                page.depth,
                page.content_hash,
                page.title,
                page.meta_description,
                page.content_type,
                i64::try_from(page.content_length).unwrap_or(i64::MAX),
                page.retry_count,
                page.error_message,
                now
            ],
        )?;
        Ok(())
    }

    fn pages_for_run(&self, run_id: &str) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE run_id = ?1 ORDER BY rowid",
            PAGE_COLUMNS
        ))?;

        let pages = stmt
            .query_map(params![run_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn count_pages(&self, run_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page(run_id: &str, page_id: &str, url: &str) -> PageResult {
        PageResult {
            page_id: page_id.to_string(),
            run_id: run_id.to_string(),
            url: url.to_string(),
            domain: "example.com".to_string(),
            status_code: 200,
            depth: 0,
            parent_page_id: None,
            referer_url: None,
            content_hash: Some("abc123".to_string()),
            title: Some("Example".to_string()),
            meta_description: None,
            content_type: Some("text/html".to_string()),
            content_length: 512,
            error_message: None,
            retry_count: 0,
        }
    }

    #[test]
    fn test_create_and_get_run() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 2).unwrap();

        let run = storage.get_run("run-1").unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.input_ref, "seeds.csv");
        assert_eq!(run.max_depth, 2);
        assert_eq!(run.total_urls, 0);
    }

    #[test]
    fn test_get_missing_run() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(matches!(
            storage.get_run("nope"),
            Err(StorageError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_update_total_urls() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 1).unwrap();
        storage.update_total_urls("run-1", 42).unwrap();
        assert_eq!(storage.get_run("run-1").unwrap().total_urls, 42);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 1).unwrap();

        assert!(storage.mark_completed("run-1").unwrap());
        assert!(!storage.mark_failed("run-1", "late failure").unwrap());
        assert!(!storage.mark_completed("run-1").unwrap());

        let run = storage.get_run("run-1").unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.error_message, None);
        assert!(storage.update_total_urls("run-1", 5).is_err());
    }

    #[test]
    fn test_mark_failed_records_message() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 1).unwrap();
        assert!(storage.mark_failed("run-1", "seed file missing").unwrap());

        let run = storage.get_run("run-1").unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("seed file missing"));
    }

    #[test]
    fn test_mark_unknown_run_errors() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.mark_completed("ghost").is_err());
    }

    #[test]
    fn test_store_and_list_pages() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 1).unwrap();

        let root = sample_page("run-1", "p1", "https://example.com/");
        let mut child = sample_page("run-1", "p2", "https://example.com/a");
        child.depth = 1;
        child.parent_page_id = Some("p1".to_string());
        child.referer_url = Some("https://example.com/".to_string());
        child.status_code = 500;
        child.error_message = Some("HTTP 500".to_string());
        child.retry_count = 2;

        storage.store_page(&root).unwrap();
        storage.store_page(&child).unwrap();

        let pages = storage.pages_for_run("run-1").unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, root);
        assert_eq!(pages[1].page, child);
        assert_eq!(storage.count_pages("run-1").unwrap(), 2);
    }

    #[test]
    fn test_store_page_is_idempotent() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 1).unwrap();

        let page = sample_page("run-1", "p1", "https://example.com/");
        storage.store_page(&page).unwrap();
        storage.store_page(&page).unwrap();

        assert_eq!(storage.count_pages("run-1").unwrap(), 1);
    }

    #[test]
    fn test_page_requires_run() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let page = sample_page("missing-run", "p1", "https://example.com/");
        assert!(storage.store_page(&page).is_err());
    }

    #[test]
    fn test_list_runs_newest_first() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "a.csv", 1).unwrap();
        storage.create_run("run-2", "b.csv", 1).unwrap();
        storage.create_run("run-3", "c.csv", 1).unwrap();

        let runs = storage.list_runs(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run-3");
        assert_eq!(runs[1].run_id, "run-2");
    }

    #[test]
    fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("crawl.db");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.create_run("run-1", "seeds.csv", 1).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.get_run("run-1").unwrap().run_id, "run-1");
    }
}
