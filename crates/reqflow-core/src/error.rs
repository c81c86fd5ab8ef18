// ── Core error types ──
//
// Errors returned as `Err` from command operations. These are all raised
// before any I/O happens; once a request is dispatched its outcome travels
// in the `Envelope`, never here. The `From<reqflow_api::Error>` impl
// translates transport-construction failures.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Missing route parameter ':{param}' for endpoint '{endpoint}'")]
    MissingParam { param: String, endpoint: String },

    #[error("Unknown method '{method}' for {backend} backend")]
    UnknownMethod { method: String, backend: String },

    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid query parameters: {message}")]
    InvalidQuery { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Transport construction ───────────────────────────────────────
    #[error("Transport setup failed: {message}")]
    Transport { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for errors caused by how a command was described
    /// rather than by the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingParam { .. }
                | Self::UnknownMethod { .. }
                | Self::InvalidMethod { .. }
                | Self::InvalidUrl { .. }
                | Self::InvalidQuery { .. }
                | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<reqflow_api::Error> for CoreError {
    fn from(err: reqflow_api::Error) -> Self {
        match err {
            reqflow_api::Error::InvalidUrl(e) => CoreError::InvalidUrl {
                url: String::new(),
                reason: e.to_string(),
            },
            reqflow_api::Error::InvalidHeader { name, reason } => CoreError::Config {
                message: format!("invalid header '{name}': {reason}"),
            },
            reqflow_api::Error::Tls(message) => CoreError::Transport { message },
            reqflow_api::Error::Transport(e) => CoreError::Transport {
                message: e.to_string(),
            },
        }
    }
}
