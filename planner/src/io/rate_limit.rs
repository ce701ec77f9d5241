//! Sliding-window limit on reasoning service calls.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

const MINUTE: Duration = Duration::from_secs(60);

/// Allows at most `max_calls` calls in any `window`; 0 means unlimited.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, MINUTE)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_calls == 0
    }

    /// Block until a call fits in the window, then record it.
    ///
    /// Returns how long the caller was held back.
    pub fn acquire(&self) -> Duration {
        if self.is_unlimited() {
            return Duration::ZERO;
        }
        let mut waited = Duration::ZERO;
        while let Some(retry_after) = self.try_acquire(Instant::now()) {
            debug!(?retry_after, max_calls = self.max_calls, "rate limited");
            thread::sleep(retry_after);
            waited += retry_after;
        }
        waited
    }

    /// Record a call at `now` if the window has room, else say how long until it does.
    fn try_acquire(&self, now: Instant) -> Option<Duration> {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        while calls
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.window)
        {
            calls.pop_front();
        }

        if calls.len() < self.max_calls as usize {
            calls.push_back(now);
            return None;
        }
        let oldest = calls.front().copied()?;
        Some(
            self.window
                .saturating_sub(now.saturating_duration_since(oldest))
                .max(Duration::from_millis(1)),
        )
    }
}
