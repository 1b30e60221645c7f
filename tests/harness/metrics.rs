// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for flood simulation results.

use axum::http::StatusCode;
use familia_intake::metrics::Outcome;
use std::collections::HashMap;
use std::fmt;

/// Classify a response the way the service's own counters do.
pub fn classify(status: StatusCode) -> Outcome {
    match status {
        StatusCode::OK => Outcome::Accepted,
        StatusCode::TOO_MANY_REQUESTS => Outcome::RateLimited,
        StatusCode::BAD_REQUEST => Outcome::Invalid,
        _ => Outcome::Error,
    }
}

/// Collects outcomes during a flood.
#[derive(Debug, Default)]
pub struct FloodMetrics {
    /// Count of requests by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Admitted requests by client IP
    accepted_per_ip: HashMap<String, usize>,
    /// Requests by client IP
    requests_per_ip: HashMap<String, usize>,
}

impl FloodMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(&mut self, outcome: Outcome, ip: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        if outcome == Outcome::Accepted {
            *self.accepted_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Requests that got past admission control.
    pub fn admitted(&self) -> usize {
        self.total_requests() - self.count(Outcome::RateLimited)
    }

    /// Largest number of accepted requests from a single IP.
    pub fn max_accepted_per_ip(&self) -> usize {
        self.accepted_per_ip.values().copied().max().unwrap_or(0)
    }

    pub fn unique_ips(&self) -> usize {
        self.requests_per_ip.len()
    }

    /// Ratio of rate-limited to total requests.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.count(Outcome::RateLimited) as f64 / total as f64
    }
}

impl fmt::Display for FloodMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Flood Report ===")?;
        writeln!(f, "Total Requests:    {}", self.total_requests())?;
        writeln!(f, "Accepted:          {}", self.count(Outcome::Accepted))?;
        writeln!(f, "Rate Limited:      {}", self.count(Outcome::RateLimited))?;
        writeln!(f, "Invalid:           {}", self.count(Outcome::Invalid))?;
        writeln!(f, "Errors:            {}", self.count(Outcome::Error))?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate() * 100.0)?;
        writeln!(f, "Unique IPs:        {}", self.unique_ips())?;
        Ok(())
    }
}
