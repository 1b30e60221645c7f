// SPDX-License-Identifier: PMPL-1.0-or-later
//! SurrealDB persistence for submissions and newsletter subscribers

use crate::config::DatabaseConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::{RecordId, Surreal};
use tracing::info;

const SUBMISSIONS: &str = "submissions";
const NEWSLETTER: &str = "newsletter";

/// A contact/inquiry submission as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub inquiry_type: String,
    pub links: String,
    pub message: String,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

/// A newsletter subscriber as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: RecordId,
}

/// Persistence for accepted form data.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new submission record.
    async fn insert_submission(&self, submission: Submission) -> Result<()>;

    /// Add `email` to the newsletter. Subscribing twice is a no-op that keeps
    /// the original subscription time.
    async fn upsert_subscriber(&self, email: &str) -> Result<()>;
}

/// Database connection wrapper
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Connect to SurrealDB (`mem://` runs an embedded in-memory store).
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = any::connect(config.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", config.url))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await
            .context("Database sign-in failed")?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connected to document store"
        );
        Ok(Self { db })
    }

    /// Fetch a subscriber by email.
    pub async fn subscriber(&self, email: &str) -> Result<Option<Subscriber>> {
        let subscriber: Option<Subscriber> = self.db.select((NEWSLETTER, email)).await?;
        Ok(subscriber)
    }

    /// All stored submissions.
    pub async fn submissions(&self) -> Result<Vec<Submission>> {
        let mut response = self
            .db
            .query("SELECT * FROM type::table($table)")
            .bind(("table", SUBMISSIONS))
            .await?;
        let submissions: Vec<Submission> = response.take(0)?;
        Ok(submissions)
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn insert_submission(&self, submission: Submission) -> Result<()> {
        let created: Option<Created> = self.db.create(SUBMISSIONS).content(submission).await?;
        let created = created.ok_or_else(|| anyhow!("Failed to store submission"))?;
        info!(id = ?created.id, "Stored submission");
        Ok(())
    }

    async fn upsert_subscriber(&self, email: &str) -> Result<()> {
        self.db
            .query(
                "INSERT INTO newsletter { id: type::thing('newsletter', $email), email: $email, created_at: $created_at } \
                 ON DUPLICATE KEY UPDATE email = $email",
            )
            .bind(("email", email.to_string()))
            .bind(("created_at", Utc::now()))
            .await?
            .check()?;
        Ok(())
    }
}
