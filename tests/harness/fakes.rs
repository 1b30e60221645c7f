// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-process stand-ins for Turnstile, SurrealDB and Resend.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use familia_intake::{
    clock::{ManualClock, SharedClock},
    config::Config,
    handlers::{router, AppState},
    limiter::RateLimiter,
    metrics::Metrics,
    notify::{EmailMessage, Mailer, Notifier},
    store::{DocumentStore, Submission},
    turnstile::SpamVerifier,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// What the stub verifier answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Trust,
    Distrust,
    Unavailable,
}

/// Turnstile stand-in that records every call.
pub struct StubVerifier {
    verdict: Mutex<Verdict>,
    calls: AtomicUsize,
    last_ip: Mutex<Option<String>>,
}

impl StubVerifier {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict: Mutex::new(verdict),
            calls: AtomicUsize::new(0),
            last_ip: Mutex::new(None),
        }
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_ip(&self) -> Option<String> {
        self.last_ip.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpamVerifier for StubVerifier {
    async fn verify(&self, _token: &str, ip: Option<&str>) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_ip.lock().unwrap() = ip.map(str::to_string);
        match *self.verdict.lock().unwrap() {
            Verdict::Trust => Ok(true),
            Verdict::Distrust => Ok(false),
            Verdict::Unavailable => Err(anyhow!("siteverify timed out")),
        }
    }
}

/// Document store kept in memory.
#[derive(Default)]
pub struct MemoryStore {
    submissions: Mutex<Vec<Submission>>,
    subscribers: Mutex<HashMap<String, DateTime<Utc>>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn subscribers(&self) -> HashMap<String, DateTime<Utc>> {
        self.subscribers.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.submissions.lock().unwrap().len() + self.subscribers.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow!("connection reset by peer"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_submission(&self, submission: Submission) -> Result<()> {
        self.check_available()?;
        self.submissions.lock().unwrap().push(submission);
        Ok(())
    }

    async fn upsert_subscriber(&self, email: &str) -> Result<()> {
        self.check_available()?;
        self.subscribers
            .lock()
            .unwrap()
            .entry(email.to_string())
            .or_insert_with(Utc::now);
        Ok(())
    }
}

/// Mailer that records messages, optionally failing every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("Resend API error: 500 Internal Server Error"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub const NOTIFY_FROM: &str = "onboarding@example.com";
pub const NOTIFY_TO: &str = "info@example.com";

/// A router wired to fakes and a manual clock.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: ManualClock,
    pub verifier: Arc<StubVerifier>,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

/// A response reduced to what tests inspect.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let clock = ManualClock::default();
        let verifier = Arc::new(StubVerifier::new(Verdict::Trust));
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let shared_clock: SharedClock = Arc::new(clock.clone());

        let state = Arc::new(AppState {
            limiter: RateLimiter::with_clock(shared_clock),
            verifier: verifier.clone(),
            store: store.clone(),
            notifier: Some(Notifier::new(mailer.clone(), NOTIFY_FROM, NOTIFY_TO)),
            metrics: Metrics::new().unwrap(),
            config,
        });

        Self {
            router: router(state.clone()),
            state,
            clock,
            verifier,
            store,
            mailer,
        }
    }

    /// POST a JSON body as client `ip` (sent via `X-Forwarded-For`).
    pub async fn post(&self, path: &str, ip: &str, body: &Value) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// POST raw bytes with the connection peer set to `peer`.
    pub async fn post_raw_from(
        &self,
        path: &str,
        peer: Option<SocketAddr>,
        body: &'static str,
    ) -> TestResponse {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        if let Some(peer) = peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}
