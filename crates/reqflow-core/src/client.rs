// ── Client ──
//
// Entry point of the core. A `Client` fixes the adapter (HTTP executor or
// realtime backend), owns the cache and the dispatcher, and creates
// commands. Cheaply cloneable; all clones share state.

use std::fmt;
use std::sync::Arc;

use futures_core::Stream;
use reqflow_api::{HttpExecutor, ResolvedRequest};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::adapter::Adapter;
use crate::cache::{Cache, CacheStorage};
use crate::command::{Command, CommandConfig, CommandDump, Method};
use crate::config::{ClientConfig, TransportKind};
use crate::dispatcher::{Dispatcher, QueueStatus};
use crate::error::CoreError;
use crate::events::{RequestEvent, request_events};
use crate::interceptor::Interceptors;
use crate::realtime::{Backend, RealtimeAdapter};
use crate::request::RequestId;

struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// HTTP client with default hooks and in-memory cache.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client backed by a realtime database instead of HTTP.
    pub fn realtime(backend: Backend) -> Self {
        ClientBuilder::new(ClientConfig::default())
            .assemble(Adapter::Realtime(RealtimeAdapter::new(backend)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Commands ─────────────────────────────────────────────────

    pub fn create_command(&self, config: CommandConfig) -> Command {
        Command::new(self.clone(), config)
    }

    /// Rebuild a command from its dump. Explicit and derived keys are kept
    /// as dumped.
    pub fn restore(&self, dump: CommandDump) -> Command {
        Command::restore(self.clone(), dump)
    }

    // ── Events ───────────────────────────────────────────────────

    /// Every lifecycle event of every request.
    pub fn events(&self) -> broadcast::Receiver<RequestEvent> {
        self.inner.dispatcher.events()
    }

    /// Events of one request. Subscribe before dispatching to see them all.
    pub fn event_stream(
        &self,
        request_id: RequestId,
    ) -> impl Stream<Item = RequestEvent> + Send + 'static {
        request_events(self.events(), request_id)
    }

    // ── Cache ────────────────────────────────────────────────────

    pub fn cache(&self) -> &Cache {
        self.inner.dispatcher.cache()
    }

    // ── Cancellation ─────────────────────────────────────────────

    /// Abort every request and subscription sharing `abort_key`.
    pub fn abort(&self, abort_key: &str) -> usize {
        self.inner.dispatcher.abort(abort_key)
    }

    pub fn unsubscribe(&self, request_id: RequestId) -> bool {
        self.inner.dispatcher.unsubscribe(request_id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.dispatcher.subscription_count()
    }

    // ── Connectivity ─────────────────────────────────────────────

    pub fn set_online(&self, online: bool) {
        self.inner.dispatcher.set_online(online);
    }

    pub fn is_online(&self) -> bool {
        self.inner.dispatcher.is_online()
    }

    pub fn online_watch(&self) -> watch::Receiver<bool> {
        self.inner.dispatcher.online_watch()
    }

    // ── Queues ───────────────────────────────────────────────────

    pub fn stop_queue(&self, queue_key: &str) {
        self.inner.dispatcher.stop_queue(queue_key);
    }

    pub fn start_queue(&self, queue_key: &str) {
        self.inner.dispatcher.start_queue(queue_key);
    }

    pub fn queue_status(&self, queue_key: &str) -> QueueStatus {
        self.inner.dispatcher.queue_status(queue_key)
    }

    pub fn queue_len(&self, queue_key: &str) -> usize {
        self.inner.dispatcher.queue_len(queue_key)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.dispatcher.pending_count()
    }

    pub fn shutdown(&self) {
        self.inner.dispatcher.shutdown();
    }

    // ── Crate-internal accessors ─────────────────────────────────

    pub(crate) fn default_method(&self) -> Method {
        self.adapter().default_method()
    }

    pub(crate) fn adapter(&self) -> &Adapter {
        self.inner.dispatcher.adapter()
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url.as_ref().map(url::Url::as_str))
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

// ── Builder ──────────────────────────────────────────────────────

pub struct ClientBuilder {
    config: ClientConfig,
    backend: Option<Backend>,
    storage: Option<Arc<dyn CacheStorage>>,
    interceptors: Interceptors,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            backend: None,
            storage: None,
            interceptors: Interceptors::default(),
            http: None,
        }
    }

    /// Route every command to a realtime backend instead of HTTP.
    pub fn realtime(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Credential hook for commands with `auth` set.
    pub fn on_auth(mut self, hook: impl Fn(&mut ResolvedRequest) + Send + Sync + 'static) -> Self {
        self.interceptors.on_auth(hook);
        self
    }

    pub fn on_request(
        mut self,
        hook: impl Fn(&mut ResolvedRequest) + Send + Sync + 'static,
    ) -> Self {
        self.interceptors.on_request(hook);
        self
    }

    pub fn on_response(
        mut self,
        hook: impl Fn(reqflow_api::Envelope) -> reqflow_api::Envelope + Send + Sync + 'static,
    ) -> Self {
        self.interceptors.on_response(hook);
        self
    }

    /// Use a preconfigured `reqwest::Client` instead of building one.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(mut self) -> Result<Client, CoreError> {
        let adapter = match self.backend.take() {
            Some(backend) => Adapter::Realtime(RealtimeAdapter::new(backend)),
            None => {
                let http = match self.http.take() {
                    Some(http) => http,
                    None => self.config.transport_config().build_client()?,
                };
                let executor = match self.config.transport {
                    TransportKind::Buffered => HttpExecutor::buffered(http),
                    TransportKind::Streaming => {
                        HttpExecutor::streaming(http, self.config.chunk_size)
                    }
                };
                Adapter::Http {
                    executor,
                    base_url: self.config.base_url.clone(),
                    timeout: self.config.timeout,
                }
            }
        };
        Ok(self.assemble(adapter))
    }

    fn assemble(self, adapter: Adapter) -> Client {
        let cache = match self.storage {
            Some(storage) => Cache::new(storage),
            None => Cache::in_memory(),
        };
        let online = !self.config.start_offline;
        info!(
            adapter = match adapter {
                Adapter::Http { .. } => "http",
                Adapter::Realtime(_) => "realtime",
            },
            online,
            "client ready"
        );
        let dispatcher = Dispatcher::new(adapter, cache, self.interceptors, online);
        Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                dispatcher,
            }),
        }
    }
}
