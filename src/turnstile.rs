// SPDX-License-Identifier: PMPL-1.0-or-later
//! Bot verification against Cloudflare Turnstile.

use crate::config::TurnstileConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Decides whether a client-supplied challenge token is trustworthy.
#[async_trait]
pub trait SpamVerifier: Send + Sync {
    /// Returns `Ok(false)` when the token is rejected and `Err` when the
    /// verification itself could not be performed.
    async fn verify(&self, token: &str, ip: Option<&str>) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Turnstile siteverify client
pub struct TurnstileVerifier {
    secret_key: Option<String>,
    verify_url: String,
    client: reqwest::Client,
}

impl TurnstileVerifier {
    pub fn new(config: &TurnstileConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: &TurnstileConfig, client: reqwest::Client) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            verify_url: config.verify_url.clone(),
            client,
        }
    }
}

#[async_trait]
impl SpamVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, ip: Option<&str>) -> Result<bool> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("Missing TURNSTILE_SECRET_KEY"))?;

        let mut params = vec![("secret", secret), ("response", token)];
        if let Some(ip) = ip {
            params.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&params)
            .send()
            .await
            .context("Turnstile request failed")?;

        let body: SiteverifyResponse = response
            .json()
            .await
            .context("Turnstile response was not valid JSON")?;

        if !body.success {
            debug!(error_codes = ?body.error_codes, "Turnstile rejected token");
        }
        Ok(body.success)
    }
}
