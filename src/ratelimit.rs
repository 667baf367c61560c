//! Per-action request throttling.
//!
//! Each API action gets its own one-second window. Callers beyond the
//! per-window limit sleep until the window rolls over.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Calls allowed per action per window.
pub const DEFAULT_LIMIT: u32 = 20;

/// Length of one throttling window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Limits how often each action may be called.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until `action` may be called, then record the call.
    pub async fn check(&self, action: &str) {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();
                let entry = windows.entry(action.to_string()).or_insert(Window {
                    started: now,
                    count: 0,
                });

                if now.duration_since(entry.started) >= self.window {
                    entry.started = now;
                    entry.count = 0;
                }

                if entry.count < self.limit {
                    entry.count += 1;
                    return;
                }

                self.window - now.duration_since(entry.started)
            };

            debug!(action, wait_ms = wait.as_millis() as u64, "rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_under_limit_does_not_wait() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.check("DescribeVpcs").await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_over_limit_waits_for_next_window() {
        let limiter = RateLimiter::new(2, Duration::from_millis(200));
        let start = Instant::now();
        limiter.check("CreateVpc").await;
        limiter.check("CreateVpc").await;
        limiter.check("CreateVpc").await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_actions_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check("CreateVpc").await;
        limiter.check("DeleteVpc").await;
        limiter.check("DescribeVpcs").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
