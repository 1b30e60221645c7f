// SPDX-License-Identifier: PMPL-1.0-or-later

//! Form Intake Service
//!
//! Backend for the public contact/inquiry form and newsletter signup:
//!
//! - Per-client fixed-window admission control (6 rpm submit, 8 rpm newsletter)
//! - Schema validation with per-field errors
//! - Cloudflare Turnstile bot verification
//! - SurrealDB persistence
//! - Best-effort staff notification through Resend

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod turnstile;
pub mod validator;

pub use config::{Config, RateLimitPolicy};
pub use error::ApiError;
pub use handlers::{router, AppState};
pub use limiter::{Bucket, Decision, RateLimiter};
