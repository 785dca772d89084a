use super::types::ResolutionResult;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tracing::debug;

/// Storage for resolution outcomes keyed by canonical URL.
pub trait ResultCache: Send + Sync {
    /// Returns the stored outcome while it is younger than the TTL
    fn lookup(&self, key: &str) -> Option<ResolutionResult>;

    /// Overwrites whatever is stored for `key`, successes and failures alike
    fn store(&self, key: &str, result: ResolutionResult);
}

struct CacheEntry {
    result: ResolutionResult,
    stored_at: Instant,
}

/// Process-local cache. Staleness is checked on lookup; nothing sweeps in
/// the background.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup_at(&self, key: &str, now: Instant) -> Option<ResolutionResult> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.result.clone());
        }
        entries.remove(key);
        debug!("Dropped stale cache entry for {}", key);
        None
    }

    fn store_at(&self, key: &str, result: ResolutionResult, now: Instant) {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                result,
                stored_at: now,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ResultCache for MemoryCache {
    fn lookup(&self, key: &str) -> Option<ResolutionResult> {
        self.lookup_at(key, Instant::now())
    }

    fn store(&self, key: &str, result: ResolutionResult) {
        self.store_at(key, result, Instant::now());
    }
}
