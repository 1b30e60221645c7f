// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the form intake service.
//!
//! Both form endpoints run the same pipeline: derive the client key, consult
//! the rate limiter, then validate, verify the Turnstile token and persist.
//! Submissions additionally notify staff by email. A rejected admission check
//! short-circuits before any validation or external call.

use crate::clock::SharedClock;
use crate::config::{Config, RateLimitPolicy};
use crate::error::{ApiError, Result};
use crate::limiter::{Decision, RateLimiter};
use crate::metrics::{Metrics, Outcome};
use crate::notify::Notifier;
use crate::store::{DocumentStore, Submission};
use crate::turnstile::SpamVerifier;
use crate::validator::{self, NewsletterForm, SubmissionForm};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Limiter key namespace for contact/inquiry submissions.
pub const SUBMIT_ENDPOINT: &str = "submit";
/// Limiter key namespace for newsletter signups.
pub const NEWSLETTER_ENDPOINT: &str = "newsletter";

/// Placeholder client identity when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter<SharedClock>,
    pub verifier: Arc<dyn SpamVerifier>,
    pub store: Arc<dyn DocumentStore>,
    pub notifier: Option<Notifier>,
    pub metrics: Metrics,
    pub config: Config,
}

/// Success response body.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/submit", post(submit).fallback(method_not_allowed))
        .route(
            "/api/newsletter",
            post(newsletter).fallback(method_not_allowed),
        );

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    let cors = cors_layer(state.config.cors_allow_origin.as_deref());
    router.layer(cors).with_state(state)
}

fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    match allow_origin.and_then(|origin| HeaderValue::from_str(origin).ok()) {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([axum::http::Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        None => CorsLayer::permissive(),
    }
}

/// Identify the client: first `X-Forwarded-For` entry, then the peer
/// address, then `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Limiter key for `endpoint` and client `ip`.
pub fn limiter_key(endpoint: &str, ip: &str) -> String {
    format!("{}:{}", endpoint, ip)
}

fn admit(state: &AppState, endpoint: &str, ip: &str, policy: RateLimitPolicy) -> Result<()> {
    let key = limiter_key(endpoint, ip);
    match state.limiter.check_policy(&key, policy) {
        Decision::Admit => Ok(()),
        Decision::Reject { retry_after } => {
            let retry_after_secs = whole_secs(retry_after);
            info!(endpoint, ip, limit = policy.limit, retry_after_secs, "Request rate limited");
            Err(ApiError::RateLimited { retry_after_secs })
        }
    }
}

/// Whole seconds for `Retry-After`, rounded up and never zero.
fn whole_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

async fn verify_token(state: &AppState, token: &str, ip: &str, rejection: &'static str) -> Result<()> {
    let remote_ip = (ip != UNKNOWN_CLIENT).then_some(ip);
    let trusted = state
        .verifier
        .verify(token, remote_ip)
        .await
        .context("Bot verification failed")?;
    if trusted {
        Ok(())
    } else {
        info!(ip, "Spam check failed");
        Err(ApiError::SpamCheckFailed(rejection))
    }
}

fn outcome_of(result: &Result<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Accepted,
        Err(ApiError::RateLimited { .. }) => Outcome::RateLimited,
        Err(ApiError::InvalidInput { .. }) => Outcome::Invalid,
        Err(ApiError::SpamCheckFailed(_)) => Outcome::Spam,
        Err(ApiError::MethodNotAllowed | ApiError::Internal(_)) => Outcome::Error,
    }
}

fn finish(state: &AppState, endpoint: &str, result: Result<()>) -> Response {
    state.metrics.record(endpoint, outcome_of(&result));
    match result {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Contact/inquiry form submission.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let result = process_submission(&state, &ip, &body).await;
    finish(&state, SUBMIT_ENDPOINT, result)
}

async fn process_submission(state: &AppState, ip: &str, body: &[u8]) -> Result<()> {
    admit(state, SUBMIT_ENDPOINT, ip, state.config.rate_limit.submit)?;

    let form: SubmissionForm = validator::parse_body(body);
    let valid = validator::validate_submission(&form).map_err(|fields| ApiError::InvalidInput {
        message: "Invalid form data",
        fields,
    })?;

    verify_token(
        state,
        &valid.turnstile_token,
        ip,
        "Spam check failed. Please try again.",
    )
    .await?;

    let submission = Submission {
        name: valid.name,
        email: valid.email,
        inquiry_type: valid.inquiry_type,
        links: valid.links,
        message: valid.message,
        ip: ip.to_string(),
        created_at: Utc::now(),
    };

    state
        .store
        .insert_submission(submission.clone())
        .await
        .context("Failed to store submission")?;
    info!(ip, inquiry_type = %submission.inquiry_type, "Submission accepted");

    // The submission is already persisted; a failed email must not fail the request.
    if let Some(notifier) = &state.notifier {
        match notifier.notify_submission(&submission).await {
            Ok(()) => debug!(to = notifier.recipient(), "Submission notification sent"),
            Err(err) => warn!(error = %format!("{:#}", err), "Submission notification failed"),
        }
    }

    Ok(())
}

/// Newsletter signup.
pub async fn newsletter(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let result = process_signup(&state, &ip, &body).await;
    finish(&state, NEWSLETTER_ENDPOINT, result)
}

async fn process_signup(state: &AppState, ip: &str, body: &[u8]) -> Result<()> {
    admit(state, NEWSLETTER_ENDPOINT, ip, state.config.rate_limit.newsletter)?;

    let form: NewsletterForm = validator::parse_body(body);
    let valid = validator::validate_signup(&form).map_err(|fields| ApiError::InvalidInput {
        message: "Invalid email",
        fields,
    })?;

    verify_token(state, &valid.turnstile_token, ip, "Spam check failed.").await?;

    state
        .store
        .upsert_subscriber(&valid.email)
        .await
        .context("Failed to store subscriber")?;
    info!(ip, "Newsletter signup accepted");

    Ok(())
}

/// Fallback for non-POST requests to the form endpoints.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Root banner.
pub async fn index() -> &'static str {
    "Get Familia API running"
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_buckets(state.limiter.len());
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
