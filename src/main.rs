// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Intake Service
//!
//! Serves `POST /api/submit` (contact/inquiry form) and
//! `POST /api/newsletter` (newsletter signup), each guarded by a per-client
//! fixed-window rate limiter.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env`):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:5000, or `PORT`)
//! - `SUBMIT_RATE_LIMIT` / `SUBMIT_RATE_WINDOW_MS`: submission policy (default: 6 / 60000)
//! - `NEWSLETTER_RATE_LIMIT` / `NEWSLETTER_RATE_WINDOW_MS`: signup policy (default: 8 / 60000)
//! - `TURNSTILE_SECRET_KEY`: Turnstile secret
//! - `DATABASE_URL`: SurrealDB endpoint (default: mem://)
//! - `RESEND_API_KEY`, `NOTIFY_TO_EMAIL`, `FROM_EMAIL`: staff notification

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use familia_intake::{
    clock::{SharedClock, SystemClock},
    config::Config,
    handlers::{router, AppState},
    limiter::RateLimiter,
    metrics::Metrics,
    notify::Notifier,
    store::SurrealStore,
    turnstile::TurnstileVerifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        submit_limit = config.rate_limit.submit.limit,
        submit_window_ms = config.rate_limit.submit.window_ms,
        newsletter_limit = config.rate_limit.newsletter.limit,
        newsletter_window_ms = config.rate_limit.newsletter.window_ms,
        "Starting form intake service"
    );

    if config.turnstile.secret_key.is_none() {
        warn!("TURNSTILE_SECRET_KEY is not set; every form request will fail verification");
    }

    let store = SurrealStore::connect(&config.database).await?;
    let notifier = Notifier::from_config(&config.notify);
    if notifier.is_none() {
        info!("Email notification disabled");
    }

    let clock: SharedClock = Arc::new(SystemClock);
    let state = Arc::new(AppState {
        limiter: RateLimiter::with_clock(clock),
        verifier: Arc::new(TurnstileVerifier::new(&config.turnstile)),
        store: Arc::new(store),
        notifier,
        metrics: Metrics::new()?,
        config: config.clone(),
    });

    // Spawn sweep task
    if let Some(period) = config.rate_limit.sweep_interval() {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sweep_state.limiter.sweep();
                sweep_state.metrics.set_buckets(sweep_state.limiter.len());
            }
        });
    }

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
