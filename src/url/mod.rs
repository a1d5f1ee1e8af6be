//! URL handling module
//!
//! This module provides URL normalization, crawlability filtering, domain
//! comparison, and the repeated-segment loop heuristic. Everything here is a
//! pure function of its inputs.

mod domain;
mod filter;
mod loops;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, is_same_domain, is_same_domain_url};
pub use filter::UrlFilter;
pub use loops::{has_repeated_segments, is_loop_trap};
pub use normalize::normalize_url;
