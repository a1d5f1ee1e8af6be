//! Content Crawler main entry point
//!
//! This is the command-line interface for the content crawler.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use content_crawler::config::{load_config_or_default, Config};
use content_crawler::crawler::{Coordinator, CrawlLimits};
use content_crawler::input::{FileSeedSource, SeedSource, StaticSeeds};
use content_crawler::output::{load_page_tree, load_run_report, print_page_tree, print_run_list, print_run_report};
use content_crawler::state::DomainPolicy;
use content_crawler::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// How many runs `status` lists without `--run-id`
const RECENT_RUNS: usize = 10;

/// Content Crawler: a depth-bounded concurrent web crawler
///
/// Crawls seed URLs breadth-first up to a configured depth, honouring
/// per-domain delays, and records every page result in SQLite.
#[derive(Parser, Debug)]
#[command(name = "content-crawler")]
#[command(version)]
#[command(about = "A depth-bounded concurrent web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply if it does not exist)
    #[arg(short, long, value_name = "CONFIG", default_value = "crawler.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the seed URLs listed in INPUT
    Run {
        /// A .csv of seed URLs, or a file listing CSV paths
        #[arg(value_name = "INPUT", required_unless_present = "url")]
        input: Option<PathBuf>,

        /// Seed URL given inline (repeatable; replaces INPUT)
        #[arg(long)]
        url: Vec<String>,

        /// Cap on pages queued in this run (0 for unlimited)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum link depth from the seeds
        #[arg(long)]
        depth: Option<u32>,

        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<usize>,

        /// Follow links to other domains
        #[arg(long)]
        allow_cross_domain: bool,

        /// Disable the repeated-path-segment heuristic
        #[arg(long)]
        no_loop_prevention: bool,

        /// Visit each domain at most once per run
        #[arg(long)]
        once_per_domain: bool,
    },

    /// Show one run, or the most recent runs
    Status {
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Summarize a finished run
    Report {
        run_id: String,

        /// Print the parent/child page tree instead of the summary
        #[arg(long)]
        tree: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::debug!("Loading configuration from: {}", cli.config.display());
    let mut config = load_config_or_default(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Run {
            input,
            url,
            max_pages,
            depth,
            workers,
            allow_cross_domain,
            no_loop_prevention,
            once_per_domain,
        } => {
            if let Some(max_pages) = max_pages {
                config.crawler.max_pages = Some(max_pages);
            }
            if let Some(depth) = depth {
                config.crawler.max_depth = depth;
            }
            if let Some(workers) = workers {
                config.crawler.max_workers = workers;
            }
            if allow_cross_domain {
                config.crawler.allow_cross_domain = true;
            }
            if no_loop_prevention {
                config.crawler.enable_loop_prevention = false;
            }
            if once_per_domain {
                config.crawler.domain_policy = DomainPolicy::OncePerDomain;
            }
            content_crawler::config::validate(&config).context("invalid crawler settings")?;

            let source: Box<dyn SeedSource> = match input {
                Some(path) if url.is_empty() => Box::new(FileSeedSource::new(path)),
                _ => Box::new(StaticSeeds::new(url)),
            };
            handle_run(&config, source.as_ref()).await
        }
        Command::Status { run_id } => handle_status(&config, run_id.as_deref()),
        Command::Report { run_id, tree } => handle_report(&config, &run_id, tree),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("content_crawler=info,warn"),
            1 => EnvFilter::new("content_crawler=debug,info"),
            2 => EnvFilter::new("content_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the `run` command: crawls until drained or interrupted
async fn handle_run(config: &Config, source: &dyn SeedSource) -> Result<()> {
    let mut coordinator = Coordinator::from_config(config).context("failed to set up crawler")?;

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight pages");
            shutdown.shutdown();
        }
    });

    let limits = CrawlLimits::from_config(&config.crawler);
    let run_id = coordinator.run(source, limits).await?;

    println!("Run {} completed", run_id);
    if let Some(stats) = coordinator.last_stats() {
        println!(
            "  {} pages processed, {} succeeded, {} failed ({:.1}% success) in {:.1}s",
            stats.processed,
            stats.succeeded,
            stats.failed,
            stats.success_rate,
            stats.elapsed.as_secs_f64()
        );
    }
    println!("  Database: {}", config.output.database_path);
    Ok(())
}

fn open_database(config: &Config) -> Result<impl Storage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Handles the `status` command
fn handle_status(config: &Config, run_id: Option<&str>) -> Result<()> {
    let storage = open_database(config)?;

    match run_id {
        Some(run_id) => {
            let run = storage
                .get_run(run_id)
                .with_context(|| format!("no run {}", run_id))?;
            let pages = storage.count_pages(run_id)?;
            println!("Run: {}", run.run_id);
            println!("  Status: {}", run.status);
            println!("  Input: {}", run.input_ref);
            println!("  Seed URLs: {}", run.total_urls);
            println!("  Pages stored: {}", pages);
            println!("  Started: {}", run.created_at);
            println!("  Updated: {}", run.updated_at);
            if let Some(error) = run.error_message {
                println!("  Error: {}", error);
            }
        }
        None => print_run_list(&storage.list_runs(RECENT_RUNS)?),
    }

    Ok(())
}

/// Handles the `report` command
fn handle_report(config: &Config, run_id: &str, tree: bool) -> Result<()> {
    let storage = open_database(config)?;

    if tree {
        let tree = load_page_tree(&storage, run_id)?;
        print_page_tree(run_id, &tree);
    } else {
        let report = load_run_report(&storage, run_id)?;
        print_run_report(&report);
    }

    Ok(())
}
