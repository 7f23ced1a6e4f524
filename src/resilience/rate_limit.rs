//! Sliding-window rate limiting per endpoint.
//!
//! Each endpoint keeps the timestamps of its admitted calls. A call is
//! admitted while fewer than `max_requests` timestamps fall inside the
//! trailing window; otherwise it fails fast. Nothing is queued.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Past this many endpoints, windows with no recent calls are dropped.
const MAX_TRACKED_ENDPOINTS: usize = 1024;

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Admit a call at `now`, or return how long until a slot frees up.
    pub fn check(&self, endpoint: &str, now: Instant) -> Result<(), Duration> {
        if self.windows.len() > MAX_TRACKED_ENDPOINTS {
            self.prune(now);
        }
        let mut timestamps = self.windows.entry(endpoint.to_string()).or_default();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Calls currently counted against an endpoint.
    pub fn in_window(&self, endpoint: &str, now: Instant) -> usize {
        self.windows
            .get(endpoint)
            .map(|ts| {
                ts.iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Endpoints with a window currently held in memory.
    pub fn tracked_endpoints(&self) -> usize {
        self.windows.len()
    }

    fn prune(&self, now: Instant) {
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < self.window)
        });
        tracing::debug!(before, after = self.windows.len(), "Pruned idle rate windows");
    }

    pub fn reset(&self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixth_call_in_window_is_rejected() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(5));
        let start = Instant::now();

        for i in 0..5 {
            assert!(limiter.check("/sessions", start + Duration::from_millis(i * 100)).is_ok());
        }
        let retry_after = limiter
            .check("/sessions", start + Duration::from_millis(500))
            .unwrap_err();
        assert_eq!(retry_after, Duration::from_millis(4500));
        assert_eq!(limiter.in_window("/sessions", start + Duration::from_millis(500)), 5);
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(5));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.check("/sessions", start).unwrap();
        }
        assert!(limiter.check("/sessions", start + Duration::from_secs(4)).is_err());
        assert!(limiter.check("/sessions", start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_endpoints_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(5));
        let now = Instant::now();
        assert!(limiter.check("/sessions", now).is_ok());
        assert!(limiter.check("/sessions", now).is_err());
        assert!(limiter.check("/profiles", now).is_ok());
    }

    #[test]
    fn test_idle_windows_are_pruned() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(5));
        let start = Instant::now();
        for i in 0..=MAX_TRACKED_ENDPOINTS {
            limiter.check(&format!("/sessions/s-{}", i), start).unwrap();
        }
        assert_eq!(limiter.tracked_endpoints(), MAX_TRACKED_ENDPOINTS + 1);

        // Only endpoints with calls inside the window survive.
        let later = start + Duration::from_secs(6);
        limiter.check("/profiles/me", start + Duration::from_secs(3)).unwrap();
        limiter.check("/sessions", later).unwrap();
        assert_eq!(limiter.tracked_endpoints(), 2);
        assert_eq!(limiter.in_window("/profiles/me", later), 1);
    }

    #[test]
    fn test_rejected_calls_do_not_extend_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(5));
        let start = Instant::now();
        limiter.check("/x", start).unwrap();
        limiter.check("/x", start).unwrap();
        for s in 1..5 {
            assert!(limiter.check("/x", start + Duration::from_secs(s)).is_err());
        }
        assert!(limiter.check("/x", start + Duration::from_secs(5)).is_ok());
    }
}
