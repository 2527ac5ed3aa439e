use std::collections::HashMap;

/// Remembers when each flight's status was last resolved.
#[derive(Debug, Clone)]
pub struct FetchTracker {
    window_secs: u64,
    fetched: HashMap<String, u64>,
}

impl FetchTracker {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            fetched: HashMap::new(),
        }
    }

    pub fn record(&mut self, flight: &str, timestamp: u64) {
        self.fetched.insert(flight.to_string(), timestamp);
    }

    pub fn last_fetched(&self, flight: &str) -> Option<u64> {
        self.fetched.get(flight).copied()
    }

    /// True iff the flight was resolved at most `window_secs` before `now`.
    pub fn is_fresh_at(&self, flight: &str, now: u64) -> bool {
        match self.fetched.get(flight) {
            Some(fetched_at) => now.saturating_sub(*fetched_at) <= self.window_secs,
            None => false,
        }
    }
}
