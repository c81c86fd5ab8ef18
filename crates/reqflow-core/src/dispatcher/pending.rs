use std::sync::Arc;

use reqflow_api::Envelope;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::events::ResponseGate;
use crate::request::{MaterializedRequest, RequestId};

/// Continuation record for one dispatched request.
///
/// Every caller waiting on the request (the original one plus any
/// deduplicated joiners) holds the receiving half of one waiter. The record
/// settles exactly once; later `settle` calls are no-ops.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) request: Arc<MaterializedRequest>,
    /// Cancellation for every attempt of the request, behind its gate.
    pub(crate) gate: Arc<ResponseGate>,
    waiters: Vec<oneshot::Sender<Envelope>>,
    settled: bool,
}

impl PendingRequest {
    pub(crate) fn new(
        request: Arc<MaterializedRequest>,
        gate: Arc<ResponseGate>,
        waiter: oneshot::Sender<Envelope>,
    ) -> Self {
        Self {
            request,
            gate,
            waiters: vec![waiter],
            settled: false,
        }
    }

    /// Attach another caller. Hands the waiter back if already settled.
    pub(crate) fn join(
        &mut self,
        waiter: oneshot::Sender<Envelope>,
    ) -> Result<(), oneshot::Sender<Envelope>> {
        if self.settled {
            return Err(waiter);
        }
        self.waiters.push(waiter);
        Ok(())
    }

    /// Deliver `envelope` to every waiter. Returns `false` if the record
    /// had already settled.
    pub(crate) fn settle(&mut self, envelope: Envelope) -> bool {
        if self.settled {
            return false;
        }
        self.settled = true;
        for waiter in self.waiters.drain(..) {
            // Receiver gone means the caller stopped waiting.
            let _ = waiter.send(envelope.clone());
        }
        true
    }

    pub(crate) fn waiters(&self) -> usize {
        self.waiters.len()
    }
}

/// Dedupe window bookkeeping for one cache key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InFlight {
    pub(crate) request_id: RequestId,
    pub(crate) started: Instant,
}

impl InFlight {
    pub(crate) fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            started: Instant::now(),
        }
    }
}
