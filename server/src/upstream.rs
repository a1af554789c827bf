//! Upstream delegate client.
//!
//! When an upstream base URL is configured, team creation, gig listing and
//! creation, and mentor booking are forwarded to it verbatim instead of being
//! handled against the local store. The upstream's JSON response is returned
//! to the caller unmodified, and local state is never touched for a delegated
//! call - the strategy is picked once per request, never mixed.
//!
//! The client is designed to be shared across handlers via `Arc`. Failures
//! are surfaced as [`UpstreamError`] and propagate to the caller of the
//! enclosing operation; there is no local fallback once delegation has been
//! attempted.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Default timeout for delegated requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when forwarding a call to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request to the upstream timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream is unreachable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status returned by the upstream.
        status: StatusCode,
        /// Raw response body, for the error message only.
        body: String,
    },

    /// Failed to parse the upstream response as JSON.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// Client configuration error.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// HTTP client for the configured upstream system.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl UpstreamClient {
    /// Creates a new upstream client.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if the HTTP client cannot be
    /// created.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                UpstreamError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            base_url,
            bearer_token,
        })
    }

    /// Forwards a call to the upstream and returns its JSON body unmodified.
    ///
    /// The method, JSON body, and query parameters are passed through as-is;
    /// a bearer token header is added when one is configured.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] - the request exceeded the timeout
    /// - [`UpstreamError::Unavailable`] - the upstream is unreachable
    /// - [`UpstreamError::Status`] - the upstream answered with a non-2xx status
    /// - [`UpstreamError::InvalidResponse`] - the body was not valid JSON
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        json: Option<&Value>,
        params: Option<&[(String, String)]>,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(method = %method, url = %url, "Forwarding to upstream");

        let mut request = self.http_client.request(method, &url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = json {
            request = request.json(body);
        }
        if let Some(params) = params {
            request = request.query(params);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(REQUEST_TIMEOUT)
            } else if e.is_connect() {
                UpstreamError::Unavailable(format!("connection failed: {e}"))
            } else {
                UpstreamError::Unavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Upstream call failed");
            return Err(UpstreamError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(format!("failed to parse body: {e}")))
    }
}
