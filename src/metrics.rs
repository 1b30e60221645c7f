// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the form endpoints.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// How a form request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    RateLimited,
    Invalid,
    Spam,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::RateLimited => "rate_limited",
            Self::Invalid => "invalid",
            Self::Spam => "spam",
            Self::Error => "error",
        }
    }
}

/// Service metrics, registered on a private registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    buckets: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "familia_form_requests_total",
                "Form requests by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;
        let buckets = IntGauge::new(
            "familia_rate_limit_buckets",
            "Rate limit buckets currently tracked",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(buckets.clone()))?;

        Ok(Self {
            registry,
            requests,
            buckets,
        })
    }

    /// Count one finished request.
    pub fn record(&self, endpoint: &str, outcome: Outcome) {
        self.requests
            .with_label_values(&[endpoint, outcome.as_str()])
            .inc();
    }

    /// Current count for an endpoint/outcome pair.
    pub fn count(&self, endpoint: &str, outcome: Outcome) -> u64 {
        self.requests
            .with_label_values(&[endpoint, outcome.as_str()])
            .get()
    }

    pub fn set_buckets(&self, tracked: usize) {
        self.buckets.set(tracked as i64);
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
