//! Error types for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

/// Remediation text returned when no upstream API token is configured.
const UPSTREAM_REMEDIATION: &str = "The search provider API token is not configured. \
     Set OSINTGATE__UPSTREAM__API_TOKEN (or upstream.api_token in the config file) and restart the gateway.";

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing, foreign or otherwise unusable bearer token, or bad login
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token claims the NFT holder class but its wallet segment is unusable
    #[error("Malformed NFT holder token")]
    MalformedToken,

    /// Wallet login for an address with no balance on either chain
    #[error("No NFT held by {0}")]
    NotHolder(String),

    /// Quota exhausted for the current window
    #[error("Rate limit exceeded")]
    QuotaExceeded {
        /// When the current window ends, epoch milliseconds
        reset_time_ms: u64,
    },

    /// No upstream API token configured
    #[error("Upstream search provider is not configured")]
    UpstreamNotConfigured,

    /// The upstream provider failed or answered with an error status
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Malformed request body or missing fields
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl GateError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Unauthorized(_) | GateError::MalformedToken => StatusCode::UNAUTHORIZED,
            GateError::NotHolder(_) => StatusCode::FORBIDDEN,
            GateError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::UpstreamNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::Config(_) | GateError::Internal(_) | GateError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Unauthorized(_) => "unauthorized",
            GateError::MalformedToken => "malformed_token",
            GateError::NotHolder(_) => "not_holder",
            GateError::QuotaExceeded { .. } => "rate_limited",
            GateError::UpstreamNotConfigured => "upstream_not_configured",
            GateError::Upstream(_) => "upstream_error",
            GateError::BadRequest(_) => "bad_request",
            GateError::Config(_) | GateError::Internal(_) | GateError::Io(_) => "internal_error",
        }
    }

    /// Message safe to show to any client.
    fn public_message(&self) -> String {
        match self {
            GateError::UpstreamNotConfigured => UPSTREAM_REMEDIATION.to_string(),
            GateError::Upstream(_) => "Upstream search provider request failed".to_string(),
            GateError::Config(_) | GateError::Internal(_) | GateError::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether `public_message` hides information that `detail` would reveal.
    fn has_hidden_detail(&self) -> bool {
        matches!(
            self,
            GateError::Upstream(_) | GateError::Config(_) | GateError::Internal(_) | GateError::Io(_)
        )
    }

    fn log(&self) {
        match self {
            GateError::Config(_) | GateError::Internal(_) | GateError::Io(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            GateError::Upstream(_) | GateError::UpstreamNotConfigured => {
                tracing::warn!(error = %self, "Upstream unavailable");
            }
            _ => {
                tracing::debug!(error = %self, "Request rejected");
            }
        }
    }

    /// Build the HTTP response, optionally including internal error detail.
    ///
    /// Detail is meant for non-production deployments only.
    pub fn to_response(&self, expose_details: bool) -> Response {
        self.log();

        let reset_time = match self {
            GateError::QuotaExceeded { reset_time_ms } => Some(format_reset_time(*reset_time_ms)),
            _ => None,
        };

        let detail = (expose_details && self.has_hidden_detail()).then(|| self.to_string());

        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
            reset_time,
            detail,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}

/// Render an epoch-millisecond reset time as RFC 3339 / ISO-8601 in UTC.
pub fn format_reset_time(reset_time_ms: u64) -> String {
    i64::try_from(reset_time_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| reset_time_ms.to_string())
}
