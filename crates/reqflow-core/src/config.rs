// ── Runtime client configuration ──
//
// Describes how a client reaches its HTTP backend. Front ends build a
// `ClientConfig` and hand it in; the core never reads config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqflow_api::{DEFAULT_CHUNK_SIZE, TlsMode, TransportConfig};
use serde::{Deserialize, Serialize};
use url::Url;

/// Which HTTP executor the client uses.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    /// Whole-body uploads.
    #[default]
    Buffered,
    /// Chunked uploads with per-chunk progress.
    Streaming,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// Configuration for one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prefix joined with every relative endpoint. Without one, only
    /// absolute endpoints resolve.
    pub base_url: Option<Url>,
    pub transport: TransportKind,
    pub tls: TlsVerification,
    /// Per-request timeout unless a command sets its own.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Upload slice size for the streaming transport.
    pub chunk_size: usize,
    /// Sent with every request.
    pub headers: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    /// Start with connectivity marked down.
    pub start_offline: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            transport: TransportKind::default(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            chunk_size: DEFAULT_CHUNK_SIZE,
            headers: BTreeMap::new(),
            user_agent: None,
            start_offline: false,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Self::default()
        }
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        let mut transport = TransportConfig {
            tls: match self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(ref path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            connect_timeout: self.connect_timeout,
            default_headers: self.headers.clone(),
            ..TransportConfig::default()
        };
        if let Some(ref agent) = self.user_agent {
            transport.user_agent.clone_from(agent);
        }
        transport
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parses_lowercase() {
        assert_eq!("streaming".parse::<TransportKind>().unwrap(), TransportKind::Streaming);
        assert_eq!(TransportKind::Buffered.to_string(), "buffered");
    }

    #[test]
    fn user_agent_override_reaches_transport() {
        let mut config = ClientConfig::new(Url::parse("http://localhost").unwrap());
        config.user_agent = Some("probe/1".into());
        config.tls = TlsVerification::DangerAcceptInvalid;
        let transport = config.transport_config();
        assert_eq!(transport.user_agent, "probe/1");
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
    }
}
