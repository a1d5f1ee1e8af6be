//! The visitation ledger: which normalized URLs have been claimed
//!
//! Every URL is in one of three conditions: unknown, in flight (claimed by a
//! worker, not yet resolved), or visited (resolved, skipped, or failed). The
//! only transitions are unknown -> in flight -> visited, so a URL can be
//! claimed at most once per run.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InFlight,
    Visited,
}

/// Run-scoped record of claimed URLs, shared by every worker
#[derive(Debug, Default)]
pub struct VisitationLedger {
    entries: Mutex<HashMap<String, Visit>>,
}

impl VisitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Visit>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `key` for the caller
    ///
    /// Check and mark happen under one lock, so of any number of concurrent
    /// callers exactly one gets `true` for a given key, and only once per run.
    pub fn try_claim(&self, key: &str) -> bool {
        match self.entries().entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Visit::InFlight);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Resolves a claim; the key stays visited for the rest of the run
    pub fn release(&self, key: &str) {
        if let Some(visit) = self.entries().get_mut(key) {
            *visit = Visit::Visited;
        }
    }

    /// Whether `key` has ever been claimed
    pub fn is_known(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.entries().get(key) == Some(&Visit::InFlight)
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries()
            .values()
            .filter(|v| **v == Visit::InFlight)
            .count()
    }

    /// Number of URLs ever claimed, in flight or resolved
    pub fn visited_count(&self) -> usize {
        self.entries().len()
    }

    /// Claims `key` and returns a guard that releases it when dropped
    pub fn claim(self: &Arc<Self>, key: &str) -> Option<Claim> {
        self.try_claim(key).then(|| Claim {
            ledger: Arc::clone(self),
            key: key.to_string(),
        })
    }
}

/// A held claim on one URL
///
/// Dropping the claim releases it, including when the owning task unwinds.
#[derive(Debug)]
pub struct Claim {
    ledger: Arc<VisitationLedger>,
    key: String,
}

impl Claim {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.ledger.release(&self.key);
    }
}
