// reqflow-core: Request lifecycle engine between reqflow-api and front ends.

mod adapter;
pub mod cache;
pub mod client;
pub mod command;
pub mod config;
mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod keys;
pub mod realtime;
pub mod request;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{Cache, CacheEntry, CacheStorage, MemoryStorage};
pub use client::{Client, ClientBuilder};
pub use command::{Command, CommandConfig, CommandDump, CommandOptions, FetchArgs, Method, Mock};
pub use config::{ClientConfig, TlsVerification, TransportKind};
pub use dispatcher::QueueStatus;
pub use error::CoreError;
pub use events::{RequestEvent, RequestEventKind};
pub use keys::{DispatchKeys, KeyOverrides, derive_key};
pub use realtime::{
    Backend, BackendError, Constraint, DocumentBackend, DocumentMethod, KeyValueBackend,
    KeyValueMethod, RealtimeAdapter, ValueStream,
};
pub use request::{MaterializedRequest, RequestId};

// Transport-layer types callers need alongside the core.
pub use reqflow_api::{Envelope, Payload, ProgressReport, RequestError, TransportOptions};
