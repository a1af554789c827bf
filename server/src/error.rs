//! Error types for the Pulseboard server.
//!
//! [`ApiError`] is the error surface of the mutating HTTP operations. Its
//! variants map one-to-one onto response classes:
//!
//! - [`ApiError::Validation`] - client sent a value outside its allowed range
//!   (400, state untouched, no broadcast)
//! - [`ApiError::NotFound`] - client referenced an unknown team or mentor
//!   (404, state untouched, no broadcast)
//! - [`ApiError::Upstream`] - a delegated call to the configured upstream
//!   failed (502, no local fallback once delegation was attempted)
//!
//! Per-subscriber delivery failures during a broadcast are deliberately not
//! represented here: they are recovered inside the dispatcher by pruning the
//! subscriber and never surface to the caller of the triggering operation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::upstream::UpstreamError;

/// Errors returned by API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request value failed a range or shape check.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced identifier does not exist in the roster or directory.
    #[error("not found: {0}")]
    NotFound(String),

    /// A delegated upstream call failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ApiError {
    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a new not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Returns `true` if this error indicates a client-side problem.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Creates an error body without a machine-readable code.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    /// Attaches a machine-readable error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(error = %self, code = self.code(), "Request failed");
        let body = ErrorResponse::new(self.to_string()).with_code(self.code());
        (self.status(), Json(body)).into_response()
    }
}

/// A specialized Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
