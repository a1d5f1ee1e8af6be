//! State module for tracking crawl progress
//!
//! This module provides the run-scoped shared state mutated by workers.
//!
//! # Components
//!
//! - `VisitationLedger`: which normalized URLs are claimed, in flight, or visited
//! - `DomainRegistry`: per-domain rate limiting and the once-per-domain policy
//! - `TaskStage`: the lifecycle of a single task inside a worker

mod domain_state;
mod ledger;
mod task_stage;

// Re-export main types
pub use domain_state::{DomainPolicy, DomainRegistry, DomainState};
pub use ledger::{Claim, VisitationLedger};
pub use task_stage::{TaskProgress, TaskStage};
