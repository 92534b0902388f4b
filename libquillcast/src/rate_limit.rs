//! Fixed-window request limiting
//!
//! Counts requests per key in windows aligned to multiples of the window
//! length. State is in-memory and per process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Unix timestamp at which the window resets
    pub reset_at: i64,
}

impl RateDecision {
    /// Seconds until the window resets, never less than one
    pub fn retry_after(&self, now: i64) -> u64 {
        (self.reset_at - now).max(1) as u64
    }
}

struct Window {
    start: i64,
    count: u32,
}

pub struct FixedWindowLimiter {
    max_requests: u32,
    window_secs: i64,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_secs: window.as_secs().max(1) as i64,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `max_requests` per minute
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    fn window_start(&self, now: i64) -> i64 {
        now - now.rem_euclid(self.window_secs)
    }

    /// Count a request for `key` and decide whether it may proceed
    ///
    /// Rejected requests do not consume a slot.
    pub fn check(&self, key: &str, now: i64) -> RateDecision {
        let start = self.window_start(now);
        let reset_at = start + self.window_secs;

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_insert(Window { start, count: 0 });

        if window.start != start {
            window.start = start;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        window.count += 1;
        RateDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            reset_at,
        }
    }

    /// Drop windows that ended before `now`
    pub fn cleanup(&self, now: i64) {
        let current = self.window_start(now);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, w| w.start >= current);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let limiter = FixedWindowLimiter::per_minute(3);
        let now = 1_200;

        let decisions: Vec<bool> = (0..4).map(|_| limiter.check("ip", now).allowed).collect();
        assert_eq!(decisions, vec![true, true, true, false]);
    }

    #[test]
    fn test_remaining_and_reset() {
        let limiter = FixedWindowLimiter::per_minute(10);
        let first = limiter.check("ip", 1_215);
        assert_eq!(first.remaining, 9);
        assert_eq!(first.reset_at, 1_260);
        assert_eq!(first.retry_after(1_215), 45);
    }

    #[test]
    fn test_window_rollover() {
        let limiter = FixedWindowLimiter::per_minute(1);
        assert!(limiter.check("user", 1_259).allowed);
        assert!(!limiter.check("user", 1_259).allowed);
        assert!(limiter.check("user", 1_260).allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::per_minute(1);
        assert!(limiter.check("a", 0).allowed);
        assert!(limiter.check("b", 0).allowed);
        assert!(!limiter.check("a", 0).allowed);
    }

    #[test]
    fn test_cleanup_drops_stale_windows() {
        let limiter = FixedWindowLimiter::per_minute(5);
        limiter.check("old", 0);
        limiter.check("new", 120);
        limiter.cleanup(130);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
