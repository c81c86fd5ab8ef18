// ── Request event bus ──
//
// Every lifecycle callback from executors and realtime adapters is
// republished on a broadcast channel, tagged with the request id and its
// dispatch keys. Dispatcher-level events (cache hits, dedupe joins,
// queueing, retries, aborts) go out on the same channel.

use std::sync::{Arc, Mutex};

use futures_core::Stream;
use futures_util::StreamExt;
use reqflow_api::{Envelope, EventSink, Progress, ProgressReport};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::keys::DispatchKeys;
use crate::request::RequestId;

pub(crate) const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub request_id: RequestId,
    pub keys: Arc<DispatchKeys>,
    pub kind: RequestEventKind,
}

#[derive(Debug, Clone, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RequestEventKind {
    // ── Dispatcher ───────────────────────────────────────────────
    CacheHit(Envelope),
    Deduplicated { leader: RequestId },
    Enqueued,
    Deferred,
    Retry { attempt: u32, remaining: u32 },
    Abort,

    // ── Transport lifecycle ──────────────────────────────────────
    BeforeRequest,
    RequestStart,
    RequestProgress(ProgressReport),
    RequestEnd,
    ResponseStart,
    ResponseProgress(ProgressReport),
    Timeout,
    /// Success or error; check `Envelope::is_success`. Subscriptions emit
    /// one of these per backend emission.
    Response(Envelope),
    ResponseEnd,
}

/// Stream of events for a single request. Lagged receivers skip ahead.
pub fn request_events(
    receiver: broadcast::Receiver<RequestEvent>,
    request_id: RequestId,
) -> impl Stream<Item = RequestEvent> + Send + 'static {
    BroadcastStream::new(receiver).filter_map(move |item| async move {
        item.ok().filter(|event| event.request_id == request_id)
    })
}

// ── Response gate ────────────────────────────────────────────────

/// Orders a request's outcome events against its abort.
///
/// The dispatcher cancels and publishes `Abort` inside `close`; sinks
/// publish `Response` inside `pass`. Whichever takes the lock first wins,
/// so no `Response` ever follows an `Abort` on the bus.
#[derive(Debug)]
pub(crate) struct ResponseGate {
    cancel: CancellationToken,
    closed: Mutex<bool>,
}

impl ResponseGate {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            closed: Mutex::new(false),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `emit` unless the request was aborted or cancelled.
    pub(crate) fn pass(&self, emit: impl FnOnce()) {
        let closed = self.closed.lock().expect("response gate lock poisoned");
        if !*closed && !self.cancel.is_cancelled() {
            emit();
        }
    }

    /// Cancel the request, then run `emit` before any outcome can slip by.
    pub(crate) fn close(&self, emit: impl FnOnce()) {
        let mut closed = self.closed.lock().expect("response gate lock poisoned");
        *closed = true;
        self.cancel.cancel();
        emit();
    }
}

// ── Sink adapter ─────────────────────────────────────────────────

/// Bridges the `EventSink` callbacks of one attempt onto the bus.
///
/// Success and error go through the request's [`ResponseGate`]. Aborts are
/// reported by the dispatcher, so `on_abort` is silent here.
pub(crate) struct BusSink {
    tx: broadcast::Sender<RequestEvent>,
    request_id: RequestId,
    keys: Arc<DispatchKeys>,
    gate: Arc<ResponseGate>,
    started: Instant,
    response_started: Mutex<Option<Instant>>,
}

impl BusSink {
    pub(crate) fn new(
        tx: broadcast::Sender<RequestEvent>,
        request_id: RequestId,
        keys: Arc<DispatchKeys>,
        gate: Arc<ResponseGate>,
    ) -> Self {
        Self {
            tx,
            request_id,
            keys,
            gate,
            started: Instant::now(),
            response_started: Mutex::new(None),
        }
    }

    fn emit(&self, kind: RequestEventKind) {
        let _ = self.tx.send(RequestEvent {
            request_id: self.request_id,
            keys: Arc::clone(&self.keys),
            kind,
        });
    }
}

impl EventSink for BusSink {
    fn on_before_request(&self) {
        self.emit(RequestEventKind::BeforeRequest);
    }

    fn on_request_start(&self) {
        self.emit(RequestEventKind::RequestStart);
    }

    fn on_request_progress(&self, progress: Progress) {
        let report = ProgressReport::new(progress, self.started.elapsed());
        self.emit(RequestEventKind::RequestProgress(report));
    }

    fn on_request_end(&self) {
        self.emit(RequestEventKind::RequestEnd);
    }

    fn on_response_start(&self) {
        *self
            .response_started
            .lock()
            .expect("response_started lock poisoned") = Some(Instant::now());
        self.emit(RequestEventKind::ResponseStart);
    }

    fn on_response_progress(&self, progress: Progress) {
        let since = self
            .response_started
            .lock()
            .expect("response_started lock poisoned")
            .unwrap_or(self.started);
        let report = ProgressReport::new(progress, since.elapsed());
        self.emit(RequestEventKind::ResponseProgress(report));
    }

    fn on_success(&self, envelope: &Envelope) {
        self.gate
            .pass(|| self.emit(RequestEventKind::Response(envelope.clone())));
    }

    fn on_error(&self, envelope: &Envelope) {
        self.gate
            .pass(|| self.emit(RequestEventKind::Response(envelope.clone())));
    }

    fn on_response_end(&self) {
        self.emit(RequestEventKind::ResponseEnd);
    }

    fn on_timeout_error(&self) {
        self.emit(RequestEventKind::Timeout);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqflow_api::RequestError;
    use serde_json::json;

    use crate::command::Method;
    use crate::endpoint::{Params, QueryParams};

    fn sink(gate: &Arc<ResponseGate>) -> (BusSink, broadcast::Receiver<RequestEvent>) {
        let (tx, rx) = broadcast::channel(16);
        let keys = DispatchKeys::derive("/x", &Method::GET, &Params::new(), &QueryParams::new());
        let sink = BusSink::new(tx, RequestId::new(), Arc::new(keys), Arc::clone(gate));
        (sink, rx)
    }

    #[test]
    fn outcome_passes_an_open_gate() {
        let gate = Arc::new(ResponseGate::new(CancellationToken::new()));
        let (sink, mut rx) = sink(&gate);
        sink.on_success(&Envelope::success(json!(1), 200));
        assert!(matches!(rx.try_recv().unwrap().kind, RequestEventKind::Response(_)));
    }

    #[test]
    fn closed_gate_drops_outcomes_after_the_abort() {
        let gate = Arc::new(ResponseGate::new(CancellationToken::new()));
        let (sink, mut rx) = sink(&gate);
        gate.close(|| sink.emit(RequestEventKind::Abort));
        assert!(gate.token().is_cancelled());

        sink.on_success(&Envelope::success(json!(1), 200));
        sink.on_error(&Envelope::failure(
            RequestError::Connection {
                message: "late".into(),
            },
            0,
        ));
        assert!(matches!(rx.try_recv().unwrap().kind, RequestEventKind::Abort));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancelled_token_also_closes_the_gate() {
        let cancel = CancellationToken::new();
        let gate = Arc::new(ResponseGate::new(cancel.child_token()));
        let (sink, mut rx) = sink(&gate);
        cancel.cancel();
        sink.on_error(&Envelope::aborted());
        assert!(rx.try_recv().is_err());
    }
}
