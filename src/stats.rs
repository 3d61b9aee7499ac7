//! Per-HTTP-method invocation counters.
//!
//! Counters are created on first use and never reset. Creation goes through
//! the map's entry API, so two threads racing on a new method end up
//! sharing one counter: the loser increments the winner's counter.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct InvocationStats {
    counters: DashMap<String, Arc<AtomicU64>>,
}

impl InvocationStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one invocation of `http_method`.
    pub fn record(&self, http_method: &str) {
        // Fast path: shard read lock only.
        if let Some(counter) = self.counters.get(http_method) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let counter = Arc::clone(
            self.counters
                .entry(http_method.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .value(),
        );
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current count for `http_method`, zero if never seen.
    #[must_use]
    pub fn count(&self, http_method: &str) -> u64 {
        self.counters
            .get(http_method)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// The live counter for `http_method`, if it exists.
    #[must_use]
    pub fn counter(&self, http_method: &str) -> Option<Arc<AtomicU64>> {
        self.counters.get(http_method).map(|c| Arc::clone(c.value()))
    }

    /// Point-in-time copy of every counter, keyed by method.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Number of distinct methods seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
