// SPDX-License-Identifier: PMPL-1.0-or-later

//! Flood patterns for abuse simulation.

use familia_intake::config::RateLimitPolicy;
use std::time::Duration;

/// Which public endpoint a flood targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Submit,
    Newsletter,
}

impl Target {
    pub fn path(self) -> &'static str {
        match self {
            Self::Submit => "/api/submit",
            Self::Newsletter => "/api/newsletter",
        }
    }
}

/// Flood pattern configuration.
#[derive(Debug, Clone)]
pub struct FloodConfig {
    /// Endpoint under attack
    pub target: Target,
    /// Total number of requests to send
    pub total_requests: usize,
    /// Simulated time between consecutive requests
    pub interval: Duration,
    /// Number of unique client IPs
    pub unique_ips: usize,
    /// Fraction of requests carrying an invalid payload (0.0-1.0)
    pub invalid_ratio: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            target: Target::Submit,
            total_requests: 100,
            interval: Duration::from_millis(100),
            unique_ips: 1,
            invalid_ratio: 0.0,
        }
    }
}

/// Predefined flood patterns.
impl FloodConfig {
    /// One client hammering the contact form.
    pub fn single_ip_flood() -> Self {
        Self {
            total_requests: 200,
            interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Many clients, each at a modest rate.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            interval: Duration::from_millis(20),
            unique_ips: 100,
            ..Default::default()
        }
    }

    /// One client spraying malformed payloads.
    pub fn junk_payload_flood() -> Self {
        Self {
            total_requests: 60,
            interval: Duration::from_millis(50),
            invalid_ratio: 1.0,
            ..Default::default()
        }
    }

    /// Newsletter signups spread just under the limit.
    pub fn slow_drip() -> Self {
        Self {
            target: Target::Newsletter,
            total_requests: 40,
            interval: Duration::from_millis(7_600), // 8 per ~60.8s window
            ..Default::default()
        }
    }

    /// Simulated duration of the whole flood.
    pub fn duration(&self) -> Duration {
        self.interval * self.total_requests as u32
    }

    /// Upper bound on admissions for a single client under `policy`.
    ///
    /// Every window admits at most `limit` requests, and a window starts at
    /// most once per `window + 1ms`.
    pub fn max_admitted_per_ip(&self, policy: RateLimitPolicy) -> usize {
        let span = self.duration().as_millis() as u64;
        let windows = span / (policy.window_ms + 1) + 1;
        windows as usize * policy.limit.max(1) as usize
    }
}
