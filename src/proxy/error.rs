//! Forwarding errors and their response envelopes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// Label wrapped around upstream error bodies.
pub const UPSTREAM_ERROR_LABEL: &str = "Error from GitLab API";
/// Generic message returned when the upstream could not be reached.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Failed to proxy request to GitLab API";
/// Message returned when the envelope has no `apiPath`.
pub const MISSING_API_PATH_MESSAGE: &str = "apiPath is required";

/// Why a forwarded call did not produce a successful upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// `apiPath` was absent or empty.
    #[error("apiPath is required")]
    MissingApiPath,

    /// `method` is not a standard HTTP verb.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// An `apiHeaders` entry has an invalid name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The inbound body could not be read as an envelope.
    #[error("{0}")]
    MalformedEnvelope(String),

    /// Base URL plus `apiPath` does not form a valid URL.
    #[error("Invalid upstream URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Upstream answered with a non-success status.
    #[error("Upstream responded with {status}")]
    Upstream { status: StatusCode, details: Value },

    /// The upstream call could not complete.
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors constructing a `Forwarder` at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("'{0}' is not a valid header name")]
    TokenHeader(String),

    #[error("access token is not a valid header value")]
    AccessToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl ForwardError {
    /// Status code returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiPath
            | Self::UnsupportedMethod(_)
            | Self::InvalidHeader(_)
            | Self::MalformedEnvelope(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::InvalidUrl { .. } | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body returned to the caller. Transport details are never included.
    pub fn body(&self) -> Value {
        match self {
            Self::Upstream { details, .. } => json!({
                "error": UPSTREAM_ERROR_LABEL,
                "details": details,
            }),
            Self::InvalidUrl { .. } | Self::Transport(_) => json!({ "error": TRANSPORT_ERROR_MESSAGE }),
            other => json!({ "error": other.to_string() }),
        }
    }

    /// True for errors raised before any network I/O.
    pub fn is_validation(&self) -> bool {
        self.status() == StatusCode::BAD_REQUEST && !matches!(self, Self::Upstream { .. })
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
