use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::SecurityError;

/// Sliding-window rate limiter.
///
/// At most `max_calls` checks succeed within any `period`. A rejected check
/// reports how long until the oldest recorded call leaves the window.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

/// Point-in-time view of a limiter window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub calls: usize,
    pub max_calls: usize,
    pub remaining: usize,
    /// Time until the oldest call in the window expires; zero when empty.
    pub reset_in: Duration,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, max_calls: usize, period: Duration) -> Self {
        Self {
            name: name.into(),
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a call now, or fail with the wait time if the window is full.
    pub fn check(&self) -> Result<(), SecurityError> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<(), SecurityError> {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        prune(&mut calls, now, self.period);

        if calls.len() >= self.max_calls {
            let retry_after = calls
                .front()
                .map_or(self.period, |oldest| self.expires_in(*oldest, now));
            tracing::debug!(
                limiter = %self.name,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "rate limit exhausted"
            );
            return Err(SecurityError::RateLimited {
                resource: self.name.clone(),
                retry_after,
            });
        }

        calls.push_back(now);
        Ok(())
    }

    /// Current window usage. Expired entries are ignored but not removed.
    pub fn status(&self) -> RateLimitStatus {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> RateLimitStatus {
        let calls = self
            .calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let live: Vec<&Instant> = calls
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.period)
            .collect();
        let reset_in = live
            .first()
            .map_or(Duration::ZERO, |oldest| self.expires_in(**oldest, now));
        RateLimitStatus {
            calls: live.len(),
            max_calls: self.max_calls,
            remaining: self.max_calls.saturating_sub(live.len()),
            reset_in,
        }
    }

    /// Time until `recorded` leaves the window. Computed from elapsed time so
    /// a huge `period` cannot overflow `Instant`.
    fn expires_in(&self, recorded: Instant, now: Instant) -> Duration {
        self.period
            .saturating_sub(now.saturating_duration_since(recorded))
    }

    pub fn reset(&self) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while calls
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) >= period)
    {
        calls.pop_front();
    }
}
