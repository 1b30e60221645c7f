// SPDX-License-Identifier: PMPL-1.0-or-later
//! User-facing error types for the form endpoints

use crate::validator::FieldErrors;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Every way a form request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Too many requests. Try again soon.")]
    RateLimited { retry_after_secs: u64 },

    #[error("{message}")]
    InvalidInput {
        message: &'static str,
        fields: FieldErrors,
    },

    #[error("{0}")]
    SpamCheckFailed(&'static str),

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidInput { .. } | Self::SpamCheckFailed(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let fields = match &self {
            Self::InvalidInput { fields, .. } => Some(fields),
            _ => None,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
            fields,
        });

        match &self {
            Self::Internal(err) => {
                error!(error = %format!("{:#}", err), "Request failed");
                (status, body).into_response()
            }
            Self::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
