//! Background job: sweep expired entries out of the result cache.
//!
//! Runs every 5 minutes per §4.4. The cache also self-cleans on read (an
//! expired entry is evicted the moment it's looked up), so this job only
//! needs to reclaim entries nobody has asked for lately.

use std::time::Duration;
use tokio::time;

use crate::cache::ResultCache;

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(cache: ResultCache) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(5 * 60));
        loop {
            interval.tick().await;
            let removed = cache.sweep();
            if removed > 0 {
                tracing::debug!(removed, remaining = cache.len(), "cache sweep");
            }
        }
    });
}
