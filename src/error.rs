// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the engagement core.

use crate::store::StoreError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Application error types.
///
/// Domain-validation failures (`InvalidOption`, `PollExpired`) are local and
/// reported to the caller; `Store` is logged and surfaced as a generic
/// failure.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("authentication required")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateExceeded { retry_after: Duration },

    #[error("poll option {0} out of range")]
    InvalidOption(usize),

    #[error("poll closed at {0}")]
    PollExpired(DateTime<Utc>),

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("unknown entity: {0}")]
    EntityNotFound(String),

    #[error("notification not found: {0}")]
    NotificationNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Machine-readable error code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateExceeded { .. } => "RATE_LIMITED",
            Self::InvalidOption(_) => "INVALID_OPTION",
            Self::PollExpired(_) => "POLL_EXPIRED",
            Self::InvalidEntity(_) => "INVALID_ENTITY",
            Self::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidOption(_) | Self::PollExpired(_) | Self::InvalidEntity(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::EntityNotFound(_) | Self::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (message, retry_after_secs) = match &self {
            // Persistence detail stays in the logs, not the response.
            Self::Store(err) => {
                tracing::error!(error = %err, "request failed on store error");
                ("internal error".to_string(), None)
            }
            Self::RateExceeded { retry_after } => {
                let secs = (retry_after.as_millis() as u64 + 999) / 1000;
                (self.to_string(), Some(secs))
            }
            _ => (self.to_string(), None),
        };

        let body = Json(ErrorBody {
            error: message,
            code: self.code(),
            retry_after_secs,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after_secs {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        if matches!(self, Self::Unauthorized) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, "Bearer".parse().unwrap());
        }

        response
    }
}
