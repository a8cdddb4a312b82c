//! Result cache keyed by `(query, mode)`.
//!
//! Process-local and non-persistent by design (§4.4): a restart clears
//! it. Single-writer-per-key semantics are not required — the cache is
//! a hint, not a lock, so the last writer on a given key simply wins.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::Mode;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

/// TTL by mode, per §4.4.
pub fn ttl_for_mode(mode: Mode) -> Duration {
    match mode {
        Mode::Quick => Duration::from_secs(15 * 60),
        Mode::Standard => Duration::from_secs(20 * 60),
        Mode::Deep => Duration::from_secs(30 * 60),
    }
}

/// Short, collision-resistant fingerprint of `query || "::" || mode`.
pub fn fingerprint(query: &str, mode: Mode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"::");
    hasher.update(mode.as_str().as_bytes());
    hex::encode(hasher.finalize())[..20].to_string()
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Returns the cached value if present and not expired. An expired
    /// entry is removed on read (in addition to the periodic sweep).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let expired = match self.entries.get(key) {
            Some(entry) => Instant::now() > entry.expires_at,
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            return None;
        }

        self.entries
            .get(key)
            .and_then(|entry| serde_json::from_value(entry.value.clone()).ok())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Ok(json) = serde_json::to_value(value) else {
            return;
        };
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: json,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove all expired entries. Called by the periodic sweep job.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fingerprint_is_stable_and_mode_sensitive() {
        let a = fingerprint("what is http?", Mode::Quick);
        let b = fingerprint("what is http?", Mode::Quick);
        let c = fingerprint("what is http?", Mode::Deep);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn get_after_set_returns_value_until_expiry() {
        let cache = ResultCache::new();
        cache.set("k", &serde_json::json!({"report": "hi"}), Duration::from_millis(50));
        let v: serde_json::Value = cache.get("k").expect("should hit");
        assert_eq!(v["report"], "hi");
    }

    #[test]
    fn get_misses_after_expiry() {
        let cache = ResultCache::new();
        cache.set("k", &serde_json::json!({"report": "hi"}), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        let v: Option<serde_json::Value> = cache.get("k");
        assert!(v.is_none());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = ResultCache::new();
        cache.set("fresh", &1, Duration::from_secs(60));
        cache.set("stale", &2, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        let removed = cache.sweep();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }
}
