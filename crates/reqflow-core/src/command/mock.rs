use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqflow_api::{Envelope, EventSink};
use tokio_util::sync::CancellationToken;

use crate::request::MaterializedRequest;

type Responder = dyn Fn(&MaterializedRequest) -> Envelope + Send + Sync;

/// Canned responder that stands in for the transport.
///
/// Goes through the full dispatcher pipeline (cache, dedupe, queue, retry)
/// and emits the same lifecycle events an executor would.
#[derive(Clone)]
pub struct Mock {
    responder: Arc<Responder>,
    delay: Duration,
}

impl Mock {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&MaterializedRequest) -> Envelope + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: Duration::ZERO,
        }
    }

    /// Simulated latency before the response is produced.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) async fn respond(
        &self,
        request: &MaterializedRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Envelope {
        sink.on_before_request();
        sink.on_request_start();
        sink.on_request_end();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                sink.on_abort();
                return Envelope::aborted();
            }
            () = tokio::time::sleep(self.delay) => {}
        }

        sink.on_response_start();
        let envelope = (self.responder)(request);
        if envelope.is_success() {
            sink.on_success(&envelope);
        } else {
            sink.on_error(&envelope);
        }
        sink.on_response_end();
        envelope
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
