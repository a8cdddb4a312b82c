//! Admission-layer rate limiting: a fixed-window counter per source
//! address, one bucket per admitted category (research POSTs, history
//! GETs). A per-key counter behind a mutex, per §5's "shared mutable
//! state" note — not a sliding log, a plain fixed window that resets
//! once `window` has elapsed since the window started.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    count: u32,
    started_at: Instant,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Ok(())` if the request is admitted, or `Err(retry_after_secs)`
    /// if the caller has exceeded `max_requests` within the current window.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();

        let window = buckets.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            started_at: now,
        });

        if now.duration_since(window.started_at) >= self.window {
            window.count = 0;
            window.started_at = now;
        }

        window.count += 1;

        if window.count > self.max_requests {
            let elapsed = now.duration_since(window.started_at);
            let remaining = self.window.saturating_sub(elapsed);
            Err(remaining.as_secs().max(1))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_requests_per_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err(), "4th request in window must be rejected");
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok(), "different key must have its own bucket");
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn resets_after_window_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a").is_ok(), "first request after window elapses must reset");
    }
}
