// ── Command configuration ──
//
// `CommandConfig` is the declarative description a command is created
// from. It deserializes from TOML/JSON with every field optional, which is
// how named commands are loaded from config files. `CommandOptions` is the
// partial overlay accepted by `Command::configure`.

use std::collections::BTreeMap;
use std::time::Duration;

use reqflow_api::TransportOptions;
use reqflow_api::serde_ms;
use serde::{Deserialize, Serialize};

use super::Method;

pub const DEFAULT_RETRY_TIME: Duration = Duration::from_millis(500);
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GARBAGE_COLLECTION: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DEDUPLICATE_TIME: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommandConfig {
    /// Endpoint template, e.g. `/users/:id`.
    pub endpoint: String,

    /// Falls back to the adapter's default (`GET`, `onSnapshot`, `onValue`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,

    pub headers: BTreeMap<String, String>,

    /// Run the client's auth interceptor for this command.
    pub auth: bool,

    /// A new request aborts earlier ones sharing the abort key.
    pub cancelable: bool,

    pub retry: u32,
    #[serde(with = "serde_ms")]
    pub retry_time: Duration,

    /// Evict cached responses this long after they were written.
    /// `None` keeps them until invalidated.
    #[serde(with = "serde_ms::option", skip_serializing_if = "Option::is_none")]
    pub garbage_collection: Option<Duration>,

    pub cache: bool,
    #[serde(with = "serde_ms")]
    pub cache_time: Duration,

    /// Serialize with other requests sharing the queue key.
    pub queued: bool,

    /// Buffer while the client is offline and replay on reconnect.
    pub offline: bool,

    pub disable_request_interceptors: bool,
    pub disable_response_interceptors: bool,

    pub options: TransportOptions,

    pub deduplicate: bool,
    #[serde(with = "serde_ms")]
    pub deduplicate_time: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_key: Option<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            method: None,
            headers: BTreeMap::new(),
            auth: true,
            cancelable: false,
            retry: 0,
            retry_time: DEFAULT_RETRY_TIME,
            garbage_collection: Some(DEFAULT_GARBAGE_COLLECTION),
            cache: false,
            cache_time: DEFAULT_CACHE_TIME,
            queued: false,
            offline: false,
            disable_request_interceptors: false,
            disable_response_interceptors: false,
            options: TransportOptions::default(),
            deduplicate: false,
            deduplicate_time: DEFAULT_DEDUPLICATE_TIME,
            abort_key: None,
            cache_key: None,
            queue_key: None,
            effect_key: None,
        }
    }
}

impl CommandConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: impl Into<Method>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Shallow overlay for [`Command::configure`](super::Command::configure).
/// `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions {
    pub endpoint: Option<String>,
    pub method: Option<Method>,
    /// Merged into existing headers.
    pub headers: Option<BTreeMap<String, String>>,
    pub auth: Option<bool>,
    pub cancelable: Option<bool>,
    pub retry: Option<u32>,
    pub retry_time: Option<Duration>,
    pub garbage_collection: Option<Option<Duration>>,
    pub cache: Option<bool>,
    pub cache_time: Option<Duration>,
    pub queued: Option<bool>,
    pub offline: Option<bool>,
    pub disable_request_interceptors: Option<bool>,
    pub disable_response_interceptors: Option<bool>,
    pub options: Option<TransportOptions>,
    pub deduplicate: Option<bool>,
    pub deduplicate_time: Option<Duration>,
    pub abort_key: Option<String>,
    pub cache_key: Option<String>,
    pub queue_key: Option<String>,
    pub effect_key: Option<String>,
}

impl CommandOptions {
    pub(crate) fn apply_to(self, config: &mut CommandConfig) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut config.endpoint, self.endpoint);
        if let Some(method) = self.method {
            config.method = Some(method);
        }
        if let Some(headers) = self.headers {
            config.headers.extend(headers);
        }
        set(&mut config.auth, self.auth);
        set(&mut config.cancelable, self.cancelable);
        set(&mut config.retry, self.retry);
        set(&mut config.retry_time, self.retry_time);
        set(&mut config.garbage_collection, self.garbage_collection);
        set(&mut config.cache, self.cache);
        set(&mut config.cache_time, self.cache_time);
        set(&mut config.queued, self.queued);
        set(&mut config.offline, self.offline);
        set(
            &mut config.disable_request_interceptors,
            self.disable_request_interceptors,
        );
        set(
            &mut config.disable_response_interceptors,
            self.disable_response_interceptors,
        );
        set(&mut config.options, self.options);
        set(&mut config.deduplicate, self.deduplicate);
        set(&mut config.deduplicate_time, self.deduplicate_time);
        if self.abort_key.is_some() {
            config.abort_key = self.abort_key;
        }
        if self.cache_key.is_some() {
            config.cache_key = self.cache_key;
        }
        if self.queue_key.is_some() {
            config.queue_key = self.queue_key;
        }
        if self.effect_key.is_some() {
            config.effect_key = self.effect_key;
        }
    }
}
