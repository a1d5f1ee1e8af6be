//! Crawler module: the concurrent crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The frontier queue with drain detection
//! - HTTP fetching with per-domain rate limiting and retry
//! - Content parsing and link extraction
//! - Workers, the result sink and overall run coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod sink;
mod worker;

pub use coordinator::{run_crawl, Coordinator, CrawlLimits, ShutdownHandle, CANCELLED_MESSAGE};
pub use fetcher::{
    build_http_client, FetchOutcome, FetchPolicy, Fetcher, FetcherPool, HttpTransport, RawResponse,
    Transport, TransportError, TIMEOUT_STATUS, TRANSPORT_FAILURE_STATUS,
};
pub use frontier::{CrawlTask, Frontier, TaskGuard};
pub use parser::{content_hash, parse_html, ContentParser, ContentStrategy, HtmlContentParser, ParseError, ParsedContent};
pub use sink::{spawn_sink, ResultSink, SinkItem, SinkSummary};
pub use worker::{run_worker, WorkerContext, WorkerSettings};
