use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a transport, before any request is sent.
///
/// Per-request failures never surface here; they travel inside the
/// [`Envelope`](crate::Envelope) as a [`RequestError`].
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport construction ──────────────────────────────────────
    /// HTTP client builder failure.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A default header name or value could not be encoded.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Failure payload carried by an error envelope.
///
/// Cheap to clone so deduplicated callers and cache readers all receive
/// the same value.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestError {
    // ── Transport ───────────────────────────────────────────────────
    /// The server answered with a non-success status. `body` is the
    /// decoded response body (JSON when it parses, a string otherwise).
    #[error("HTTP {status}")]
    Http {
        status: u16,
        body: serde_json::Value,
    },

    /// Connection refused, DNS failure, reset mid-body, etc.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// No response within the configured timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The request was cancelled before it settled.
    #[error("Request aborted")]
    Aborted,

    /// The task driving the request died before producing a response.
    #[error("Request failed internally: {message}")]
    Internal { message: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// A realtime backend rejected the operation.
    #[error("Backend error ({code}): {message}")]
    Backend { code: String, message: String },
}

impl RequestError {
    /// Returns `true` for failures the dispatcher may retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Aborted | Self::Internal { .. })
    }

    /// Returns `true` if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the request was aborted.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns `true` if this is a 404 from the server.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }
}
