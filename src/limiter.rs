// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window admission control for the public form endpoints.
//!
//! Each key (`<endpoint>:<client-ip>`) owns one bucket holding the number of
//! admitted requests and the instant its window expires. A request arriving
//! after expiry starts a fresh window with a count of 1. Within a live window
//! requests are admitted until the count reaches the limit.
//!
//! The bucket map sits behind a single mutex held for the whole
//! read-check-mutate sequence, so concurrent checks on the same key can never
//! over-admit. `check` never awaits and never performs I/O.

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitPolicy;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request may proceed
    Admit,
    /// Request exceeded its window's limit; the window reopens after
    /// `retry_after`
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(self) -> bool {
        matches!(self, Decision::Admit)
    }

    pub fn is_rejected(self) -> bool {
        !self.is_admitted()
    }
}

/// Per-key counter and window expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Admissions observed in the current window
    pub count: u32,
    /// When the current window expires
    pub reset_at: Instant,
}

impl Bucket {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    /// A window is only expired strictly after `reset_at`; a request at the
    /// exact instant still counts against the old window.
    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// Thread-safe fixed-window rate limiter.
pub struct RateLimiter<C = SystemClock> {
    clock: C,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter driven by `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        // A panic while holding the lock cannot leave a bucket half-written,
        // so a poisoned map is still consistent.
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether the request identified by `key` may proceed, admitting
    /// at most `limit` requests per `window`.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> Decision {
        let now = self.clock.now();
        let mut buckets = self.buckets();

        if let Some(bucket) = buckets.get_mut(key) {
            if !bucket.is_expired(now) {
                if bucket.count >= limit {
                    debug!(key, count = bucket.count, limit, "Rate limit exceeded");
                    return Decision::Reject {
                        retry_after: bucket.reset_at.saturating_duration_since(now),
                    };
                }
                bucket.count += 1;
                return Decision::Admit;
            }
        }

        buckets.insert(key.to_owned(), Bucket::fresh(now, window));
        Decision::Admit
    }

    /// `check` with a configured policy.
    pub fn check_policy(&self, key: &str, policy: RateLimitPolicy) -> Decision {
        self.check(key, policy.limit, policy.window())
    }

    /// Snapshot of the bucket for `key`, if one exists.
    pub fn bucket(&self, key: &str) -> Option<Bucket> {
        self.buckets().get(key).copied()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets().is_empty()
    }

    /// Drop buckets whose window has expired. Returns how many were removed.
    ///
    /// An expired bucket is replaced on its key's next request anyway, so
    /// sweeping only bounds memory and never changes a decision.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        let removed = before - buckets.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.len(), "Swept expired rate limit buckets");
        }
        removed
    }
}
