//! Run reports built from stored page results

use crate::storage::{PageRecord, RunRecord, Storage};
use crate::CrawlError;
use std::collections::HashMap;

/// How many failures a report lists
const FAILURE_SAMPLE: usize = 10;

/// Crawl run summary
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunRecord,
    pub total_pages: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Total retries across all pages
    pub retries: u64,
    pub deepest: u32,
    /// Pages per domain, most pages first
    pub domains: Vec<(String, u64)>,
    /// Pages per status code, ascending by code
    pub status_codes: Vec<(u16, u64)>,
    /// First failed pages as `(url, error)`
    pub failures: Vec<(String, String)>,
}

impl RunReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_pages > 0 {
            (self.succeeded as f64 / self.total_pages as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads a run and summarizes its pages
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run_id` - The run to summarize
///
/// # Returns
///
/// * `Ok(RunReport)` - Successfully built report
/// * `Err(CrawlError)` - The run is unknown or storage failed
pub fn load_run_report(storage: &dyn Storage, run_id: &str) -> Result<RunReport, CrawlError> {
    let run = storage.get_run(run_id)?;
    let pages = storage.pages_for_run(run_id)?;
    Ok(summarize(run, &pages))
}

fn summarize(run: RunRecord, pages: &[PageRecord]) -> RunReport {
    let mut domains: HashMap<&str, u64> = HashMap::new();
    let mut status_codes: HashMap<u16, u64> = HashMap::new();
    let mut succeeded = 0;
    let mut retries = 0;
    let mut deepest = 0;
    let mut failures = Vec::new();

    for record in pages {
        let page = &record.page;
        *domains.entry(page.domain.as_str()).or_insert(0) += 1;
        *status_codes.entry(page.status_code).or_insert(0) += 1;
        retries += u64::from(page.retry_count);
        deepest = deepest.max(page.depth);

        if page.is_success() {
            succeeded += 1;
        } else if failures.len() < FAILURE_SAMPLE {
            failures.push((
                page.url.clone(),
                page.error_message
                    .clone()
                    .unwrap_or_else(|| format!("HTTP {}", page.status_code)),
            ));
        }
    }

    let mut domains: Vec<(String, u64)> = domains
        .into_iter()
        .map(|(domain, count)| (domain.to_string(), count))
        .collect();
    domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut status_codes: Vec<(u16, u64)> = status_codes.into_iter().collect();
    status_codes.sort_unstable();

    let total_pages = pages.len() as u64;
    RunReport {
        run,
        total_pages,
        succeeded,
        failed: total_pages - succeeded,
        retries,
        deepest,
        domains,
        status_codes,
        failures,
    }
}

/// Prints a run report to stdout
pub fn print_run_report(report: &RunReport) {
    let run = &report.run;
    println!("=== Crawl Run {} ===\n", run.run_id);

    println!("Run:");
    println!("  Status: {}", run.status);
    println!("  Input: {}", run.input_ref);
    println!("  Seed URLs: {}", run.total_urls);
    println!("  Max depth: {}", run.max_depth);
    println!("  Started: {}", run.created_at);
    println!("  Updated: {}", run.updated_at);
    if let Some(error) = &run.error_message {
        println!("  Error: {}", error);
    }
    println!();

    println!("Pages:");
    println!("  Total: {}", report.total_pages);
    println!(
        "  Succeeded: {} ({:.1}%)",
        report.succeeded,
        report.success_rate()
    );
    println!("  Failed: {}", report.failed);
    println!("  Retries: {}", report.retries);
    println!("  Deepest level reached: {}", report.deepest);
    println!();

    if !report.domains.is_empty() {
        println!("Domains ({}):", report.domains.len());
        for (domain, count) in &report.domains {
            println!("  {}: {}", domain, count);
        }
        println!();
    }

    if !report.status_codes.is_empty() {
        println!("Status Codes:");
        for (code, count) in &report.status_codes {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    if !report.failures.is_empty() {
        println!("Failures (first {}):", report.failures.len());
        for (url, error) in &report.failures {
            println!("  - {}: {}", url, error);
        }
    }
}

/// Prints one line per run, most recent first
pub fn print_run_list(runs: &[RunRecord]) {
    if runs.is_empty() {
        println!("No crawl runs recorded");
        return;
    }

    println!("{:<36}  {:<9}  {:>5}  {:<25}  INPUT", "RUN", "STATUS", "URLS", "STARTED");
    for run in runs {
        println!(
            "{:<36}  {:<9}  {:>5}  {:<25}  {}",
            run.run_id, run.status, run.total_urls, run.created_at, run.input_ref
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PageResult, SqliteStorage};

    fn page(id: &str, domain: &str, status: u16, depth: u32) -> PageResult {
        PageResult {
            page_id: id.to_string(),
            run_id: "run-1".to_string(),
            url: format!("https://{}/{}", domain, id),
            domain: domain.to_string(),
            status_code: status,
            depth,
            parent_page_id: None,
            referer_url: None,
            content_hash: None,
            title: None,
            meta_description: None,
            content_type: None,
            content_length: 0,
            error_message: (status != 200).then(|| format!("HTTP {}", status)),
            retry_count: if status >= 500 { 2 } else { 0 },
        }
    }

    #[test]
    fn test_load_run_report() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_run("run-1", "seeds.csv", 2).unwrap();
        storage.store_page(&page("a", "x.test", 200, 0)).unwrap();
        storage.store_page(&page("b", "x.test", 200, 1)).unwrap();
        storage.store_page(&page("c", "y.test", 500, 2)).unwrap();
        storage.store_page(&page("d", "x.test", 404, 1)).unwrap();

        let report = load_run_report(&storage, "run-1").unwrap();
        assert_eq!(report.total_pages, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.retries, 2);
        assert_eq!(report.deepest, 2);
        assert_eq!(report.domains[0], ("x.test".to_string(), 3));
        assert_eq!(report.status_codes, vec![(200, 2), (404, 1), (500, 1)]);
        assert_eq!(report.failures.len(), 2);
        assert!((report.success_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_run() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(load_run_report(&storage, "missing").is_err());
    }
}
