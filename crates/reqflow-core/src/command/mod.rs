// ── Command ──
//
// Immutable description of one logical request type. Every setter and
// `configure` return a new `Command`; the receiver is never touched, so a
// command can be shared freely and specialised per call site.

mod config;
mod dump;
mod method;
mod mock;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqflow_api::{Envelope, Payload};
use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::endpoint::{Params, QueryParams, resolve_endpoint};
use crate::error::CoreError;
use crate::keys::{DispatchKeys, KeyOverrides};
use crate::request::{MaterializedRequest, RequestId};

pub use config::{
    CommandConfig, CommandOptions, DEFAULT_CACHE_TIME, DEFAULT_DEDUPLICATE_TIME,
    DEFAULT_GARBAGE_COLLECTION, DEFAULT_RETRY_TIME,
};
pub use dump::CommandDump;
pub use method::Method;
pub use mock::Mock;

// ── FetchArgs ────────────────────────────────────────────────────

/// Per-call values layered over the command's own.
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub params: Params,
    pub query_params: QueryParams,
    /// Replaces the command's body when set.
    pub data: Option<Payload>,
    pub headers: BTreeMap<String, String>,
}

impl FetchArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ── Command ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Command {
    client: Client,
    config: CommandConfig,
    method: Method,
    params: Params,
    query_params: QueryParams,
    data: Option<Payload>,
    keys: DispatchKeys,
    overrides: KeyOverrides,
    used: bool,
    mock: Option<Mock>,
}

impl Command {
    pub(crate) fn new(client: Client, mut config: CommandConfig) -> Self {
        let method = config
            .method
            .clone()
            .unwrap_or_else(|| client.default_method());
        config.method = Some(method.clone());
        let keys = DispatchKeys::derive(
            &config.endpoint,
            &method,
            &Params::new(),
            &QueryParams::new(),
        );

        let mut command = Self {
            client,
            config,
            method,
            params: Params::new(),
            query_params: QueryParams::new(),
            data: None,
            keys,
            overrides: KeyOverrides::default(),
            used: false,
            mock: None,
        };
        command.apply_explicit_keys();
        command
    }

    pub(crate) fn restore(client: Client, dump: CommandDump) -> Self {
        let mut config = dump.config;
        config.method = Some(dump.method.clone());
        Self {
            client,
            config,
            method: dump.method,
            params: dump.params,
            query_params: dump.query_params,
            data: dump.data,
            keys: dump.keys,
            overrides: dump.overrides,
            used: dump.used,
            mock: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn keys(&self) -> &DispatchKeys {
        &self.keys
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    /// `true` once any setter or `configure` produced this value.
    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Builders ─────────────────────────────────────────────────

    /// Shallow-merge `options` into a copy of this command.
    pub fn configure(&self, options: CommandOptions) -> Self {
        self.derive_with(|next| {
            options.apply_to(&mut next.config);
            if let Some(ref method) = next.config.method {
                next.method = method.clone();
            }
            next.apply_explicit_keys();
        })
    }

    pub fn set_params(&self, params: Params) -> Self {
        self.derive_with(|next| next.params = params)
    }

    pub fn set_param(&self, name: impl Into<String>, value: impl ToString) -> Self {
        self.derive_with(|next| {
            next.params.insert(name.into(), value.to_string());
        })
    }

    pub fn set_query_params(&self, query_params: QueryParams) -> Self {
        self.derive_with(|next| next.query_params = query_params)
    }

    pub fn set_data(&self, data: impl Into<Payload>) -> Self {
        self.derive_with(|next| next.data = Some(data.into()))
    }

    pub fn set_headers(&self, headers: BTreeMap<String, String>) -> Self {
        self.derive_with(|next| next.config.headers = headers)
    }

    pub fn set_mock(&self, mock: Mock) -> Self {
        self.derive_with(|next| next.mock = Some(mock))
    }

    pub fn clear_mock(&self) -> Self {
        self.derive_with(|next| next.mock = None)
    }

    fn derive_with(&self, change: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        change(&mut next);
        next.used = true;
        next.keys.refresh(
            next.overrides,
            &next.config.endpoint,
            &next.method,
            &next.params,
            &next.query_params,
        );
        next
    }

    fn apply_explicit_keys(&mut self) {
        if let Some(ref key) = self.config.abort_key {
            self.keys.abort.clone_from(key);
            self.overrides.abort = true;
        }
        if let Some(ref key) = self.config.cache_key {
            self.keys.cache.clone_from(key);
            self.overrides.cache = true;
        }
        if let Some(ref key) = self.config.queue_key {
            self.keys.queue.clone_from(key);
            self.overrides.queue = true;
        }
        if let Some(ref key) = self.config.effect_key {
            self.keys.effect.clone_from(key);
            self.overrides.effect = true;
        }
    }

    // ── Execution ────────────────────────────────────────────────

    /// Bind call-time values and validate against the client's adapter.
    ///
    /// Fails on missing route params, unknown methods, bad headers, or an
    /// unusable URL. No I/O happens here.
    pub fn materialize(&self, args: FetchArgs) -> Result<MaterializedRequest, CoreError> {
        let FetchArgs {
            params,
            query_params,
            data,
            headers,
        } = args;

        let mut all_params = self.params.clone();
        all_params.extend(params);
        let mut query = self.query_params.clone();
        query.extend(query_params);
        let data = data.or_else(|| self.data.clone());
        let mut all_headers = self.config.headers.clone();
        all_headers.extend(headers);

        let endpoint = resolve_endpoint(&self.config.endpoint, &all_params)?;
        let mut keys = self.keys.clone();
        keys.refresh(
            self.overrides,
            &self.config.endpoint,
            &self.method,
            &all_params,
            &query,
        );
        let target = self.client.adapter().target(
            &self.method,
            &endpoint,
            &query,
            &all_headers,
            data.as_ref(),
        )?;

        Ok(MaterializedRequest {
            id: RequestId::new(),
            method: self.method.clone(),
            endpoint,
            params: all_params,
            query_params: query,
            data,
            headers: all_headers,
            keys: Arc::new(keys),
            config: self.config.clone(),
            target,
            mock: self.mock.clone(),
        })
    }

    /// Execute with call-time values. Configuration problems come back as
    /// `Err`; everything after dispatch comes back in the envelope.
    pub async fn fetch(&self, args: FetchArgs) -> Result<Envelope, CoreError> {
        let request = self.materialize(args)?;
        debug!(
            request_id = %request.id,
            method = %request.method,
            endpoint = %request.endpoint,
            "dispatching request"
        );
        Ok(self.client.dispatcher().dispatch(request).await)
    }

    pub async fn send(&self) -> Result<Envelope, CoreError> {
        self.fetch(FetchArgs::default()).await
    }

    /// Abort everything sharing this command's abort key.
    pub fn abort(&self) -> usize {
        self.client.abort(&self.keys.abort)
    }

    pub fn dump(&self) -> CommandDump {
        CommandDump {
            config: self.config.clone(),
            method: self.method.clone(),
            params: self.params.clone(),
            query_params: self.query_params.clone(),
            data: self.data.clone(),
            keys: self.keys.clone(),
            overrides: self.overrides,
            used: self.used,
        }
    }
}
