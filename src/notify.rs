// SPDX-License-Identifier: PMPL-1.0-or-later
//! Submission notifications through the Resend email API.

use crate::config::NotifyConfig;
use crate::store::Submission;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
}

/// Sends transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Resend API client
pub struct ResendMailer {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .context("Resend request failed")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("Resend API error: {}", response.status()))
        }
    }
}

/// Staff notification for new submissions.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    to: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Resend-backed notifier, when the API key, recipient and sender are
    /// all configured.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        let (api_key, to, from) = config.credentials()?;
        let mailer = ResendMailer::new(api_key, config.api_url.as_str());
        Some(Self::new(Arc::new(mailer), from, to))
    }

    /// Address new submissions are sent to.
    pub fn recipient(&self) -> &str {
        &self.to
    }

    pub async fn notify_submission(&self, submission: &Submission) -> Result<()> {
        let message = submission_notification(submission, &self.from, &self.to);
        self.mailer.send(&message).await
    }
}

/// Render the staff notification for a new submission.
pub fn submission_notification(submission: &Submission, from: &str, to: &str) -> EmailMessage {
    let links = if submission.links.is_empty() {
        "—"
    } else {
        submission.links.as_str()
    };

    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; line-height:1.6">
  <h2 style="margin:0 0 12px">New Contact / Submission</h2>
  <p><strong>Name:</strong> {name}</p>
  <p><strong>Email:</strong> {email}</p>
  <p><strong>Type:</strong> {inquiry_type}</p>
  <p><strong>Links:</strong> {links}</p>
  <p><strong>Message:</strong><br/>{message}</p>
  <hr/>
  <p style="color:#6b7280;font-size:12px">IP: {ip}</p>
</div>"#,
        name = escape_html(&submission.name),
        email = escape_html(&submission.email),
        inquiry_type = escape_html(&submission.inquiry_type),
        links = escape_html(links),
        message = escape_html(&submission.message).replace('\n', "<br/>"),
        ip = escape_html(&submission.ip),
    );

    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        reply_to: submission.email.clone(),
        subject: format!("New Get Familia Submission: {}", submission.inquiry_type),
        html,
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
