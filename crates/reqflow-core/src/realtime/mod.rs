// ── Realtime adapter ──
//
// Maps a uniform method name onto one operation of a realtime database
// backend and runs it under the same lifecycle sink contract as the HTTP
// executors. The backend variant is fixed when the adapter is built; each
// variant owns a closed, strum-parsed operation table.

mod document;
mod key_value;

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqflow_api::{Envelope, EventSink, RequestError, TransportOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::command::Method;
use crate::error::CoreError;

pub use document::{DocumentBackend, DocumentMethod};
pub use key_value::{KeyValueBackend, KeyValueMethod};

/// Status reported for a successful backend call or emission.
pub const BACKEND_SUCCESS_STATUS: u16 = 200;
/// Status reported when a backend call or emission fails.
pub const BACKEND_ERROR_STATUS: u16 = 500;

/// Emissions of a live subscription.
pub type ValueStream = BoxStream<'static, Result<Value, BackendError>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<BackendError> for RequestError {
    fn from(err: BackendError) -> Self {
        RequestError::Backend {
            code: err.code,
            message: err.message,
        }
    }
}

/// Query constraint forwarded verbatim to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Constraint {
    Where {
        field: String,
        op: String,
        value: Value,
    },
    OrderBy {
        field: String,
        #[serde(default)]
        descending: bool,
    },
    Limit {
        count: u32,
    },
    LimitToLast {
        count: u32,
    },
    StartAt {
        value: Value,
    },
    EndAt {
        value: Value,
    },
    EqualTo {
        value: Value,
    },
}

/// What a realtime operation receives.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeRequest {
    pub method: Method,
    pub path: String,
    pub constraints: Vec<Constraint>,
    pub data: Option<Value>,
    pub options: TransportOptions,
}

impl RealtimeRequest {
    pub(crate) fn data_or_null(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }

    pub(crate) fn flag(&self, name: &str) -> bool {
        self.options
            .extra
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub enum Backend {
    Document(Arc<dyn DocumentBackend>),
    KeyValue(Arc<dyn KeyValueBackend>),
}

impl Backend {
    pub fn document(backend: impl DocumentBackend + 'static) -> Self {
        Self::Document(Arc::new(backend))
    }

    pub fn key_value(backend: impl KeyValueBackend + 'static) -> Self {
        Self::KeyValue(Arc::new(backend))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::KeyValue(_) => "key-value",
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

/// A parsed operation for one backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Document(DocumentMethod),
    KeyValue(KeyValueMethod),
}

impl Operation {
    pub fn is_subscription(self) -> bool {
        matches!(
            self,
            Self::Document(DocumentMethod::OnSnapshot) | Self::KeyValue(KeyValueMethod::OnValue)
        )
    }

    pub fn requires_data(self) -> bool {
        match self {
            Self::Document(method) => method.requires_data(),
            Self::KeyValue(method) => method.requires_data(),
        }
    }
}

/// Result of invoking an operation: a single value or a subscription.
pub(crate) enum Invocation {
    Value(Value),
    Stream(ValueStream),
}

#[derive(Debug, Clone)]
pub struct RealtimeAdapter {
    backend: Backend,
}

impl RealtimeAdapter {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn default_method(&self) -> Method {
        match self.backend {
            Backend::Document(_) => Method::new(DocumentMethod::OnSnapshot.to_string()),
            Backend::KeyValue(_) => Method::new(KeyValueMethod::OnValue.to_string()),
        }
    }

    /// Resolve a method name against this backend's operation table.
    pub fn operation(&self, method: &Method) -> Result<Operation, CoreError> {
        let unknown = || CoreError::UnknownMethod {
            method: method.to_string(),
            backend: self.backend.kind().to_owned(),
        };
        match self.backend {
            Backend::Document(_) => method
                .as_str()
                .parse::<DocumentMethod>()
                .map(Operation::Document)
                .map_err(|_| unknown()),
            Backend::KeyValue(_) => method
                .as_str()
                .parse::<KeyValueMethod>()
                .map(Operation::KeyValue)
                .map_err(|_| unknown()),
        }
    }

    /// Run one operation. Subscriptions resolve on their first emission
    /// and hand back the rest of the stream; the caller decides whether to
    /// follow it with [`Emissions::forward`] or drop it.
    pub(crate) async fn execute(
        &self,
        operation: Operation,
        request: RealtimeRequest,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> (Envelope, Option<Emissions>) {
        sink.on_before_request();
        sink.on_request_start();

        let invoked = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.invoke(operation, &request) => Some(result),
        };
        let Some(invoked) = invoked else {
            sink.on_abort();
            return (Envelope::aborted(), None);
        };
        sink.on_request_end();

        let mut stream = match invoked {
            Ok(Invocation::Value(data)) => {
                sink.on_response_start();
                return (finish(sink.as_ref(), Ok(data)), None);
            }
            Ok(Invocation::Stream(stream)) => stream,
            Err(err) => {
                sink.on_response_start();
                return (finish(sink.as_ref(), Err(err)), None);
            }
        };

        let first = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                sink.on_abort();
                return (Envelope::aborted(), None);
            }
            item = stream.next() => item,
        };
        sink.on_response_start();

        match first {
            Some(Ok(data)) => {
                let envelope = finish(sink.as_ref(), Ok(data));
                debug!(path = %request.path, "subscription established");
                let tail = Emissions {
                    stream,
                    sink,
                    path: request.path,
                };
                (envelope, Some(tail))
            }
            Some(Err(err)) => (finish(sink.as_ref(), Err(err)), None),
            None => (
                finish(
                    sink.as_ref(),
                    Err(BackendError::new(
                        "closed",
                        "subscription closed before its first emission",
                    )),
                ),
                None,
            ),
        }
    }

    async fn invoke(
        &self,
        operation: Operation,
        request: &RealtimeRequest,
    ) -> Result<Invocation, BackendError> {
        trace!(method = %request.method, path = %request.path, "invoking realtime operation");
        match (&self.backend, operation) {
            (Backend::Document(backend), Operation::Document(method)) => {
                document::invoke(backend.as_ref(), method, request).await
            }
            (Backend::KeyValue(backend), Operation::KeyValue(method)) => {
                key_value::invoke(backend.as_ref(), method, request).await
            }
            _ => Err(BackendError::new(
                "invalid-operation",
                format!("'{}' does not belong to this backend", request.method),
            )),
        }
    }
}

fn finish(sink: &dyn EventSink, outcome: Result<Value, BackendError>) -> Envelope {
    let envelope = emission(outcome);
    if envelope.is_success() {
        sink.on_success(&envelope);
    } else {
        sink.on_error(&envelope);
    }
    sink.on_response_end();
    envelope
}

fn emission(outcome: Result<Value, BackendError>) -> Envelope {
    match outcome {
        Ok(data) => Envelope::success(data, BACKEND_SUCCESS_STATUS),
        Err(err) => Envelope::failure(err.into(), BACKEND_ERROR_STATUS),
    }
}

/// Emissions of a live subscription after the first one.
pub(crate) struct Emissions {
    stream: ValueStream,
    sink: Arc<dyn EventSink>,
    path: String,
}

impl Emissions {
    /// Publish every later emission until `cancel` fires or the backend
    /// closes the stream.
    pub(crate) async fn forward(mut self, cancel: CancellationToken) {
        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                item = self.stream.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            let envelope = emission(item);
            if envelope.is_success() {
                self.sink.on_success(&envelope);
            } else {
                self.sink.on_error(&envelope);
            }
        }
        debug!(path = %self.path, "subscription closed");
    }
}

impl fmt::Debug for Emissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emissions")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
