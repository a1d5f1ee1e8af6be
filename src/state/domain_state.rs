use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How often one domain may be visited during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainPolicy {
    /// Any number of URLs per domain; dedup is per exact URL only
    #[default]
    PerUrl,

    /// The first admitted URL marks its domain visited; later URLs from
    /// that domain are rejected regardless of path
    OncePerDomain,
}

/// Tracks the state of a domain during crawling
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made (or scheduled) to this domain
    pub request_count: u32,

    /// Instant of the latest request slot handed out for this domain
    pub last_request_at: Option<Instant>,

    /// Set once a URL from this domain was admitted under `OncePerDomain`
    pub visited_this_run: bool,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next request slot for this domain
    ///
    /// Slots are spaced at least `min_delay` apart. Returns how long the
    /// caller must wait from `now` before sending.
    pub fn reserve_slot(&mut self, now: Instant, min_delay: Duration) -> Duration {
        let slot = match self.last_request_at {
            Some(last) => (last + min_delay).max(now),
            None => now,
        };
        self.last_request_at = Some(slot);
        self.request_count += 1;
        slot.saturating_duration_since(now)
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_at?;
        let ready = last + min_delay;
        (ready > now).then(|| ready - now)
    }
}

/// Shared per-domain state for rate limiting and domain policy
#[derive(Debug, Default)]
pub struct DomainRegistry {
    states: Mutex<HashMap<String, DomainState>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, DomainState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves a request slot for `domain`; see [`DomainState::reserve_slot`]
    pub fn reserve_slot(&self, domain: &str, min_delay: Duration) -> Duration {
        self.states()
            .entry(domain.to_string())
            .or_default()
            .reserve_slot(Instant::now(), min_delay)
    }

    /// Applies the domain policy to one claimed URL
    ///
    /// Under `OncePerDomain` the first call for a domain wins and marks it
    /// visited; every later call for that domain returns false.
    pub fn admit(&self, domain: &str, policy: DomainPolicy) -> bool {
        match policy {
            DomainPolicy::PerUrl => true,
            DomainPolicy::OncePerDomain => {
                let mut states = self.states();
                let state = states.entry(domain.to_string()).or_default();
                if state.visited_this_run {
                    false
                } else {
                    state.visited_this_run = true;
                    true
                }
            }
        }
    }

    pub fn request_count(&self, domain: &str) -> u32 {
        self.states()
            .get(domain)
            .map_or(0, |state| state.request_count)
    }

    /// Number of distinct domains seen so far
    pub fn len(&self) -> usize {
        self.states().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_domain_state() {
        let state = DomainState::new();
        assert_eq!(state.request_count, 0);
        assert!(state.last_request_at.is_none());
        assert!(!state.visited_this_run);
    }

    #[test]
    fn test_first_slot_is_immediate() {
        let mut state = DomainState::new();
        let now = Instant::now();
        assert_eq!(state.reserve_slot(now, Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(state.request_count, 1);
    }

    #[test]
    fn test_slots_are_spaced() {
        let mut state = DomainState::new();
        let now = Instant::now();
        let delay = Duration::from_millis(500);

        assert_eq!(state.reserve_slot(now, delay), Duration::ZERO);
        assert_eq!(state.reserve_slot(now, delay), delay);
        assert_eq!(state.reserve_slot(now, delay), delay * 2);
        assert_eq!(state.request_count, 3);
    }

    #[test]
    fn test_slot_after_delay_elapsed() {
        let mut state = DomainState::new();
        let start = Instant::now();
        let delay = Duration::from_millis(100);

        state.reserve_slot(start, delay);
        let later = start + Duration::from_millis(250);
        assert_eq!(state.reserve_slot(later, delay), Duration::ZERO);
    }

    #[test]
    fn test_time_until_next_request() {
        let mut state = DomainState::new();
        let now = Instant::now();
        let delay = Duration::from_millis(1000);

        assert!(state.time_until_next_request(delay, now).is_none());

        state.reserve_slot(now, delay);
        let wait = state
            .time_until_next_request(delay, now + Duration::from_millis(400))
            .unwrap();
        assert_eq!(wait, Duration::from_millis(600));
        assert!(state
            .time_until_next_request(delay, now + Duration::from_millis(1000))
            .is_none());
    }

    #[test]
    fn test_per_url_policy_always_admits() {
        let registry = DomainRegistry::new();
        assert!(registry.admit("x.test", DomainPolicy::PerUrl));
        assert!(registry.admit("x.test", DomainPolicy::PerUrl));
    }

    #[test]
    fn test_once_per_domain_policy() {
        let registry = DomainRegistry::new();
        assert!(registry.admit("x.test", DomainPolicy::OncePerDomain));
        assert!(!registry.admit("x.test", DomainPolicy::OncePerDomain));
        assert!(registry.admit("y.test", DomainPolicy::OncePerDomain));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_counts_requests() {
        let registry = DomainRegistry::new();
        registry.reserve_slot("x.test", Duration::ZERO);
        registry.reserve_slot("x.test", Duration::ZERO);
        assert_eq!(registry.request_count("x.test"), 2);
        assert_eq!(registry.request_count("y.test"), 0);
    }
}
