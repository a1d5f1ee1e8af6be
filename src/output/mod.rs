//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Live statistics for a running crawl and the final summary
//! - Run reports built from stored page results
//! - The parent/child page tree of a run

mod report;
pub mod stats;
mod tree;

pub use report::{load_run_report, print_run_list, print_run_report, RunReport};
pub use stats::{spawn_reporter, CrawlStats, FinalStats};
pub use tree::{print_page_tree, PageTree};

use crate::storage::Storage;
use crate::CrawlError;

/// Loads every page of `run_id` and arranges them by parent
pub fn load_page_tree(storage: &dyn Storage, run_id: &str) -> Result<PageTree, CrawlError> {
    storage.get_run(run_id)?;
    Ok(PageTree::build(storage.pages_for_run(run_id)?))
}
