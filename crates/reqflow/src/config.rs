//! CLI configuration: thin wrapper around `reqflow_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--base-url, --token, --insecure, --timeout) and builds the client.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use reqflow_config::ConfigError;
use reqflow_core::{Client, ClientConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use reqflow_config::{Config, Profile, config_path, load_config_or_default, save_config};

const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Everything needed to build a client for one invocation.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub client: ClientConfig,
    /// Header name and full header value for the auth interceptor.
    pub auth: Option<(String, SecretString)>,
}

impl Resolved {
    /// Human-readable target for error messages.
    pub fn target(&self, endpoint: &str) -> String {
        match self.client.base_url {
            Some(ref base) if !endpoint.contains("://") => {
                format!("{}{endpoint}", base.as_str().trim_end_matches('/'))
            }
            _ => endpoint.to_owned(),
        }
    }
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Combine the profile with flag overrides. Flags win over profile values.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = config.profiles.get(&profile_name);

    if profile.is_none() && global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(config),
        });
    }

    // 1. Profile (or bare defaults)
    let mut client = match profile {
        Some(profile) => reqflow_config::profile_to_client_config(profile, &config.defaults)?,
        None => {
            let mut client = ClientConfig::default();
            client.transport = config.defaults.transport;
            client.timeout = Duration::from_secs(config.defaults.timeout);
            if config.defaults.insecure {
                client.tls = TlsVerification::DangerAcceptInvalid;
            }
            client
        }
    };

    // 2. Base URL (flag > env > profile)
    if let Some(ref raw) = global.base_url {
        client.base_url = Some(raw.parse().map_err(|_| CliError::Validation {
            field: "base-url".into(),
            reason: format!("invalid URL: {raw}"),
        })?);
    }

    // 3. TLS and timeout
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(seconds) = global.timeout {
        client.timeout = Duration::from_secs(seconds);
    }

    // 4. Credentials
    let auth = resolve_auth(global, profile, &profile_name)?;

    Ok(Resolved {
        profile_name,
        client,
        auth,
    })
}

/// Token from `--token`, then the profile's credential chain.
///
/// A profile without credentials sends no auth header.
fn resolve_auth(
    global: &GlobalOpts,
    profile: Option<&Profile>,
    profile_name: &str,
) -> Result<Option<(String, SecretString)>, CliError> {
    let token = match (global.token.as_deref(), profile) {
        (Some(token), _) => Some(SecretString::from(token.to_owned())),
        (None, Some(profile)) => match reqflow_config::resolve_token(profile, profile_name) {
            Ok(token) => Some(token),
            Err(ConfigError::NoCredentials { .. }) => {
                debug!(profile = profile_name, "no credentials, sending without auth");
                None
            }
            Err(err) => return Err(err.into()),
        },
        (None, None) => None,
    };

    Ok(token.map(|token| match profile {
        Some(profile) => (
            profile.auth_header.clone(),
            SecretString::from(profile.auth_value(token.expose_secret())),
        ),
        None => (
            DEFAULT_AUTH_HEADER.to_owned(),
            SecretString::from(format!("Bearer {}", token.expose_secret())),
        ),
    }))
}

/// Build the core client, wiring the auth header into the auth interceptor.
pub fn build_client(resolved: &Resolved) -> Result<Client, CliError> {
    let mut builder = Client::builder(resolved.client.clone());
    if let Some((ref name, ref value)) = resolved.auth {
        let headers = reqflow_api::transport::header_map(&BTreeMap::from([(
            name.clone(),
            value.expose_secret().to_owned(),
        )]))
        .map_err(|e| CliError::Validation {
            field: "auth header".into(),
            reason: e.to_string(),
        })?;
        builder = builder.on_auth(move |request| request.headers.extend(headers.clone()));
    }
    Ok(builder.build()?)
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
