// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the intake service.
//!
//! Values come from environment variables (optionally via a `.env` file).
//! Rate-limit defaults match the public form endpoints: 6 submissions and
//! 8 newsletter signups per client per minute.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Admission control configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Bot verification configuration
    #[serde(default)]
    pub turnstile: TurnstileConfig,

    /// Document store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Email notification configuration
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Allowed CORS origin; any origin when unset
    #[serde(default)]
    pub cors_allow_origin: Option<String>,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// A fixed-window policy: at most `limit` admissions per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window_ms: u64,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Per-endpoint admission policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Contact/inquiry submissions (default: 6 per 60s)
    #[serde(default = "default_submit_policy")]
    pub submit: RateLimitPolicy,

    /// Newsletter signups (default: 8 per 60s)
    #[serde(default = "default_newsletter_policy")]
    pub newsletter: RateLimitPolicy,

    /// Seconds between sweeps of expired buckets; 0 disables sweeping
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Cloudflare Turnstile configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_turnstile_url")]
    pub verify_url: String,
}

/// SurrealDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Endpoint, e.g. `mem://` or `ws://localhost:8000`
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// Resend email settings. Notification is sent only when the API key,
/// recipient and sender are all present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub resend_api_key: Option<String>,

    #[serde(default)]
    pub notify_to: Option<String>,

    #[serde(default)]
    pub from_email: Option<String>,

    #[serde(default = "default_resend_url")]
    pub api_url: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_submit_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(6, 60_000)
}

fn default_newsletter_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(8, 60_000)
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_turnstile_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

fn default_database_url() -> String {
    "mem://".to_string()
}

fn default_namespace() -> String {
    "familia".to_string()
}

fn default_database() -> String {
    "getfamilia".to_string()
}

fn default_resend_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            turnstile: TurnstileConfig::default(),
            database: DatabaseConfig::default(),
            notify: NotifyConfig::default(),
            cors_allow_origin: None,
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            submit: default_submit_policy(),
            newsletter: default_newsletter_policy(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for TurnstileConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            verify_url: default_turnstile_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            namespace: default_namespace(),
            database: default_database(),
            username: None,
            password: None,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            notify_to: None,
            from_email: None,
            api_url: default_resend_url(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Interval for the background bucket sweep, if enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl NotifyConfig {
    /// Returns `(api_key, to, from)` when notification is fully configured.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.resend_api_key, &self.notify_to, &self.from_email) {
            (Some(key), Some(to), Some(from)) => Some((key.as_str(), to.as_str(), from.as_str())),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let rl = RateLimitConfig::default();

        let bind_addr = var("BIND_ADDR")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{}", port.trim())))
            .unwrap_or_else(default_bind_addr);

        Config {
            bind_addr,
            rate_limit: RateLimitConfig {
                submit: RateLimitPolicy {
                    limit: parse_var(var("SUBMIT_RATE_LIMIT")).unwrap_or(rl.submit.limit),
                    window_ms: parse_var(var("SUBMIT_RATE_WINDOW_MS")).unwrap_or(rl.submit.window_ms),
                },
                newsletter: RateLimitPolicy {
                    limit: parse_var(var("NEWSLETTER_RATE_LIMIT")).unwrap_or(rl.newsletter.limit),
                    window_ms: parse_var(var("NEWSLETTER_RATE_WINDOW_MS"))
                        .unwrap_or(rl.newsletter.window_ms),
                },
                sweep_interval_secs: parse_var(var("SWEEP_INTERVAL_SECS"))
                    .unwrap_or(rl.sweep_interval_secs),
            },
            turnstile: TurnstileConfig {
                secret_key: var("TURNSTILE_SECRET_KEY"),
                verify_url: var("TURNSTILE_VERIFY_URL").unwrap_or_else(default_turnstile_url),
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL").unwrap_or_else(default_database_url),
                namespace: var("DATABASE_NS").unwrap_or_else(default_namespace),
                database: var("DATABASE_DB").unwrap_or_else(default_database),
                username: var("DATABASE_USER"),
                password: var("DATABASE_PASS"),
            },
            notify: NotifyConfig {
                resend_api_key: var("RESEND_API_KEY"),
                notify_to: var("NOTIFY_TO_EMAIL"),
                from_email: var("FROM_EMAIL"),
                api_url: var("RESEND_API_URL").unwrap_or_else(default_resend_url),
            },
            cors_allow_origin: var("CORS_ALLOW_ORIGIN"),
            metrics: MetricsConfig {
                enabled: parse_var(var("METRICS_ENABLED")).unwrap_or(true),
                path: var("METRICS_PATH").unwrap_or_else(default_metrics_path),
            },
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}
