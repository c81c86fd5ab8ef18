//! Shared configuration for reqflow front ends.
//!
//! TOML profiles, named command definitions, credential resolution
//! (env + keyring + plaintext), and translation to
//! `reqflow_core::ClientConfig`. The CLI layers flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use reqflow_core::{ClientConfig, CommandConfig, TlsVerification, TransportKind};

const KEYRING_SERVICE: &str = "reqflow";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Named command definitions, runnable by name.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
            commands: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    pub fn command(&self, name: &str) -> Result<&CommandConfig, ConfigError> {
        self.commands
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCommand { name: name.into() })
    }

    /// Name of the profile to use: explicit choice, then `default_profile`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub transport: TransportKind,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            transport: TransportKind::default(),
        }
    }
}

fn default_output() -> String {
    "json".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_auth_header() -> String {
    "Authorization".into()
}
fn default_auth_scheme() -> String {
    "Bearer".into()
}

/// A named backend profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Base URL joined with relative endpoints (e.g., "https://api.example.com/v1").
    pub base_url: String,

    /// Override the default transport.
    pub transport: Option<TransportKind>,

    /// Upload chunk size in bytes for the streaming transport.
    pub chunk_size: Option<usize>,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub user_agent: Option<String>,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Header the token is sent in.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Prefix placed before the token; empty sends the bare token.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            chunk_size: None,
            headers: BTreeMap::new(),
            user_agent: None,
            token: None,
            token_env: None,
            auth_header: default_auth_header(),
            auth_scheme: default_auth_scheme(),
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }

    /// Header value for a resolved token.
    pub fn auth_value(&self, token: &str) -> String {
        if self.auth_scheme.is_empty() {
            token.to_owned()
        } else {
            format!("{} {token}", self.auth_scheme)
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "reqflow", "reqflow").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("reqflow");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path. A missing file yields the defaults.
///
/// `REQFLOW_`-prefixed variables override file values; nested keys use a
/// double underscore (`REQFLOW_DEFAULTS__TIMEOUT=5`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("REQFLOW_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/token"),
    )?)
}

/// Resolve a token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token for `profile_name` in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

/// Build a `ClientConfig` from a profile, no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let base_url: url::Url = profile
        .base_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {}", profile.base_url),
        })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = ClientConfig::new(base_url);
    config.tls = tls;
    config.transport = profile.transport.unwrap_or(defaults.transport);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.headers = profile.headers.clone();
    config.user_agent.clone_from(&profile.user_agent);
    if let Some(chunk_size) = profile.chunk_size {
        if chunk_size == 0 {
            return Err(ConfigError::Validation {
                field: "chunk_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        config.chunk_size = chunk_size;
    }
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn auth_value_respects_scheme() {
        let mut profile = Profile::new("https://api.example.com");
        assert_eq!(profile.auth_value("abc"), "Bearer abc");
        profile.auth_scheme.clear();
        assert_eq!(profile.auth_value("abc"), "abc");
    }

    #[test]
    fn insecure_beats_custom_ca() {
        let mut profile = Profile::new("https://api.example.com");
        profile.ca_cert = Some(PathBuf::from("/tmp/ca.pem"));
        profile.insecure = Some(true);
        let config = profile_to_client_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn bad_base_url_is_a_validation_error() {
        let profile = Profile::new("not a url");
        let err = profile_to_client_config(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "base_url"));
    }
}
