// ── Transport executors ──
//
// Two ways to put a `ResolvedRequest` on the wire. `Buffered` sends the
// body in one piece, `Streaming` slices the upload into chunks and reports
// progress per chunk. Both share the settle step below, which races the
// exchange against the timeout and the cancellation token and resolves
// exactly once.

mod buffered;
mod streaming;

use std::future::Future;

use bytes::BytesMut;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::events::{EventSink, Progress};
use crate::request::ResolvedRequest;

pub use buffered::BufferedExecutor;
pub use streaming::{DEFAULT_CHUNK_SIZE, StreamingExecutor};

/// The HTTP transport, selected once when the client is built.
#[derive(Debug, Clone)]
pub enum HttpExecutor {
    Buffered(BufferedExecutor),
    Streaming(StreamingExecutor),
}

impl HttpExecutor {
    pub fn buffered(http: reqwest::Client) -> Self {
        Self::Buffered(BufferedExecutor::new(http))
    }

    pub fn streaming(http: reqwest::Client, chunk_size: usize) -> Self {
        Self::Streaming(StreamingExecutor::new(http, chunk_size))
    }

    /// Run one request to settlement.
    ///
    /// Never fails: transport problems, timeouts, and aborts all come back
    /// as error envelopes. Once `cancel` fires no success or error callback
    /// reaches `sink`.
    pub async fn execute(
        &self,
        request: &ResolvedRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Envelope {
        debug!(
            method = %request.method,
            url = %request.full_url,
            timeout_ms = request.timeout_ms(),
            "executing request"
        );
        let exchange = async {
            match self {
                Self::Buffered(executor) => executor.exchange(request, sink).await,
                Self::Streaming(executor) => executor.exchange(request, sink).await,
            }
        };
        settle(exchange, request, sink, cancel).await
    }
}

async fn settle<F>(
    exchange: F,
    request: &ResolvedRequest,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Envelope
where
    F: Future<Output = Envelope>,
{
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(url = %request.full_url, "request aborted");
            sink.on_abort();
            return Envelope::aborted();
        }
        outcome = tokio::time::timeout(request.timeout, exchange) => outcome,
    };

    let envelope = if let Ok(envelope) = outcome {
        envelope
    } else {
        warn!(url = %request.full_url, timeout_ms = request.timeout_ms(), "request timed out");
        sink.on_timeout_error();
        Envelope::timed_out(request.timeout_ms())
    };

    if envelope.is_success() {
        sink.on_success(&envelope);
    } else {
        sink.on_error(&envelope);
    }
    sink.on_response_end();
    envelope
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Drain the response body chunk by chunk, reporting download progress.
async fn read_response(mut response: reqwest::Response, sink: &dyn EventSink) -> Envelope {
    let status = response.status().as_u16();
    let total = response.content_length();
    sink.on_response_start();

    let mut body = BytesMut::new();
    let mut loaded = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                loaded += len_u64(chunk.len());
                body.extend_from_slice(&chunk);
                sink.on_response_progress(Progress { loaded, total });
            }
            Ok(None) => break,
            Err(e) => return transport_failure(&e),
        }
    }

    Envelope::from_http(status, decode_body(&body))
}

/// JSON when the body parses, a string otherwise, `null` when empty.
fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn transport_failure(err: &reqwest::Error) -> Envelope {
    let message = match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    };
    debug!(error = %message, "transport failure");
    Envelope::connection_failed(message)
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_body_falls_back_to_text() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body(b"plain"), json!("plain"));
    }
}
