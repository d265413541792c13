//! Client error type.
//!
//! Every failure of a call made through [`ApiClient`](crate::ApiClient) is
//! surfaced to the caller as an [`ApiError`]; the client never retries.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::payload::UploadError;
use crate::session::StorageError;

/// Boxed error produced by a [`Transport`](crate::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request did not complete within the configured budget.
    #[error("Request timed out after {}s", .0.as_secs_f64())]
    RequestTimeout(Duration),

    /// The server answered with a non-success status.
    ///
    /// `message` prefers the server's `message` or `detail` field and falls
    /// back to the status text.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The underlying transport failed before a response arrived.
    #[error("Network error: {0}")]
    Transport(#[source] BoxError),

    /// The response body did not match the shape the caller expected.
    #[error("Unexpected response body (HTTP {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
        body: serde_json::Value,
    },

    /// The base URL and path did not form a valid absolute URL.
    #[error("Invalid request URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A header value contained characters HTTP does not allow.
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Upload input was rejected before any request was made.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The session store could not persist a change.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Wrap a transport-level failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// HTTP status associated with the error.
    ///
    /// Timeouts report 408 even though no response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RequestTimeout(_) => Some(StatusCode::REQUEST_TIMEOUT.as_u16()),
            Self::Api { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed error body returned by the server, if any.
    #[must_use]
    pub const fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Api { details, .. } => details.as_ref(),
            Self::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the error came from the timeout race.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout(_))
    }

    /// Whether the server rejected the session (401/403).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}
