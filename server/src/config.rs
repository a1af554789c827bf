//! Server configuration module.
//!
//! Parses configuration from environment variables for the Pulseboard server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PORT` | No | 8080 | HTTP server port |
//! | `PULSEBOARD_UPSTREAM_URL` | No | - | Base URL of the upstream delegate |
//! | `PULSEBOARD_UPSTREAM_TOKEN` | No | - | Bearer token sent on delegated calls |
//! | `PULSEBOARD_CORS_ORIGINS` | No | `http://localhost:8080` | Comma-separated allowed origins |
//!
//! When `PULSEBOARD_UPSTREAM_URL` is unset (or blank), all endpoints are
//! handled locally. An empty `PULSEBOARD_CORS_ORIGINS` value allows any origin.

use std::env;

use thiserror::Error;
use tracing::info;

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Default allowed CORS origin when none are configured.
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8080";

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },

    /// Port number is invalid.
    #[error("invalid port number: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,

    /// Base URL of the upstream delegate. `None` disables delegation and all
    /// calls are handled against the local store.
    pub upstream_url: Option<String>,

    /// Bearer token attached to delegated calls, if configured.
    pub upstream_token: Option<String>,

    /// Allowed CORS origins. Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `PORT` is not a valid u16 or a variable
    /// contains invalid unicode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_port()?;
        let upstream_url = non_empty_env("PULSEBOARD_UPSTREAM_URL");
        let upstream_token = non_empty_env("PULSEBOARD_UPSTREAM_TOKEN");
        let cors_origins = parse_cors_origins();

        if let Some(url) = &upstream_url {
            info!(upstream = %url, "Upstream delegation enabled");
        }

        Ok(Self {
            port,
            upstream_url,
            upstream_token,
            cors_origins,
        })
    }

    /// Returns a configuration with delegation disabled, suitable for tests.
    #[must_use]
    pub fn local(port: u16) -> Self {
        Self {
            port,
            upstream_url: None,
            upstream_token: None,
            cors_origins: Vec::new(),
        }
    }
}

/// Reads an environment variable, treating unset and whitespace-only values
/// as absent.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => Ok(port_str.parse()?),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "PORT".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}

/// Parse the PULSEBOARD_CORS_ORIGINS environment variable.
///
/// Comma-separated origin list; blank entries are skipped. Falls back to the
/// localhost default when the variable is unset.
fn parse_cors_origins() -> Vec<String> {
    match env::var("PULSEBOARD_CORS_ORIGINS") {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => vec![DEFAULT_CORS_ORIGIN.to_string()],
    }
}
