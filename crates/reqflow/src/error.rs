//! CLI error types with miette diagnostics.
//!
//! Maps core, config, and envelope errors into user-facing errors with
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use reqflow_config::ConfigError;
use reqflow_core::{CoreError, RequestError};

/// Process exit codes.
#[allow(dead_code)]
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect: {message}")]
    #[diagnostic(
        code(reqflow::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Target: {target}"
        )
    )]
    ConnectionFailed { target: String, message: String },

    #[error("Request timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(reqflow::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { timeout_ms: u64 },

    #[error("Request aborted")]
    #[diagnostic(code(reqflow::aborted))]
    Aborted,

    #[error("Request failed internally: {message}")]
    #[diagnostic(code(reqflow::internal), help("Re-run with -vv for details."))]
    Internal { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed (HTTP {status})")]
    #[diagnostic(
        code(reqflow::auth_failed),
        help(
            "Verify the token for profile '{profile}'.\n\
             Run: reqflow config set-token --profile {profile}"
        )
    )]
    AuthFailed { status: u16, profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(reqflow::no_credentials),
        help(
            "Store a token with: reqflow config set-token\n\
             Or set the REQFLOW_TOKEN environment variable, or pass --no-auth."
        )
    )]
    NoCredentials { profile: String },

    // ── Responses ────────────────────────────────────────────────────

    #[error("{resource} '{identifier}' not found")]
    #[diagnostic(code(reqflow::not_found), help("{hint}"))]
    NotFound {
        resource: String,
        identifier: String,
        hint: String,
    },

    #[error("HTTP {status}")]
    #[diagnostic(code(reqflow::http_error), help("Response body: {body}"))]
    Http { status: u16, body: String },

    #[error("Backend error ({code}): {message}")]
    #[diagnostic(code(reqflow::backend_error))]
    Backend { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(reqflow::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(reqflow::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: reqflow config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No base URL configured")]
    #[diagnostic(
        code(reqflow::no_config),
        help(
            "Pass --base-url, use an absolute URL, or create a profile with: reqflow config init\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(reqflow::config))]
    Config(Box<ConfigError>),

    #[error(transparent)]
    #[diagnostic(code(reqflow::core))]
    Core(Box<CoreError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(reqflow::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Config(_) => exit_code::USAGE,
            Self::Core(err) if err.is_configuration() => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Translate the error half of a response envelope.
    pub fn from_request_error(err: RequestError, target: &str, profile: &str) -> Self {
        match err {
            RequestError::Connection { message } => Self::ConnectionFailed {
                target: target.into(),
                message,
            },
            RequestError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            RequestError::Aborted => Self::Aborted,
            RequestError::Internal { message } => Self::Internal { message },
            RequestError::Http { status, .. } if status == 401 || status == 403 => {
                Self::AuthFailed {
                    status,
                    profile: profile.into(),
                }
            }
            RequestError::Http { status: 404, .. } => Self::NotFound {
                resource: "endpoint".into(),
                identifier: target.into(),
                hint: "Check the endpoint path and path parameters.".into(),
            },
            RequestError::Http { status, body } => Self::Http {
                status,
                body: body.to_string(),
            },
            RequestError::Backend { code, message } => Self::Backend { code, message },
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingParam { param, endpoint } => Self::Validation {
                field: "param".into(),
                reason: format!("missing value for ':{param}' in {endpoint}, pass --param {param}=..."),
            },
            other => Self::Core(Box::new(other)),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownCommand { name } => Self::NotFound {
                resource: "command".into(),
                identifier: name,
                hint: "Run: reqflow commands list".into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
