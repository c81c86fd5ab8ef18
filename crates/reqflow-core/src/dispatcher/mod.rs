// ── Dispatcher ──
//
// Owns every materialized request from `fetch` until it settles: cache
// short-circuit, last-wins cancellation, dedupe, offline buffering, queue
// lanes, retries, and abort by key. Each request runs on its own spawned
// task so a dropped caller never stalls its queue, and a panicking task
// still settles its request.
//
// Lock discipline: `state` is a std mutex, never held across an await.

mod pending;
mod queue;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use reqflow_api::{Envelope, RequestError, STATUS_NO_RESPONSE};
use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapter::Adapter;
use crate::cache::Cache;
use crate::events::{BusSink, EVENT_CHANNEL_SIZE, RequestEvent, RequestEventKind, ResponseGate};
use crate::interceptor::Interceptors;
use crate::realtime::Emissions;
use crate::request::{MaterializedRequest, RequestId};

use self::pending::{InFlight, PendingRequest};
use self::queue::Queue;

pub use self::queue::QueueStatus;

#[derive(Debug, Default)]
struct DispatchState {
    pending: HashMap<RequestId, PendingRequest>,
    /// Latest leader per cache key, for dedupe.
    in_flight: HashMap<String, InFlight>,
    queues: HashMap<String, Queue>,
    /// Offline-capable requests dispatched while offline, in order.
    offline: Vec<Arc<MaterializedRequest>>,
}

#[derive(Debug)]
struct LiveSubscription {
    abort_key: String,
    cancel: CancellationToken,
}

enum Admission {
    Joined(RequestId),
    Deferred,
    Queued { start: bool },
    Immediate,
}

struct DispatcherInner {
    adapter: Adapter,
    cache: Cache,
    interceptors: Interceptors,
    events: broadcast::Sender<RequestEvent>,
    online: watch::Sender<bool>,
    state: Mutex<DispatchState>,
    subscriptions: DashMap<RequestId, LiveSubscription>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub(crate) struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub(crate) fn new(
        adapter: Adapter,
        cache: Cache,
        interceptors: Interceptors,
        online: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (online, _) = watch::channel(online);
        Self {
            inner: Arc::new(DispatcherInner {
                adapter,
                cache,
                interceptors,
                events,
                online,
                state: Mutex::new(DispatchState::default()),
                subscriptions: DashMap::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn adapter(&self) -> &Adapter {
        &self.inner.adapter
    }

    pub(crate) fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<RequestEvent> {
        self.inner.events.subscribe()
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Resolve `request` to exactly one envelope.
    pub(crate) async fn dispatch(&self, request: MaterializedRequest) -> Envelope {
        let request = Arc::new(request);

        if request.config.cache {
            if let Some(entry) = self.inner.cache.read(&request.keys.cache) {
                if entry.is_fresh() {
                    debug!(request_id = %request.id, cache_key = %request.keys.cache, "cache hit");
                    self.emit(&request, RequestEventKind::CacheHit(entry.envelope.clone()));
                    return entry.envelope;
                }
            }
        }

        if request.config.cancelable {
            let aborted = self.abort(&request.keys.abort);
            if aborted > 0 {
                debug!(
                    request_id = %request.id,
                    abort_key = %request.keys.abort,
                    aborted,
                    "superseded earlier requests"
                );
            }
        }

        let (tx, rx) = oneshot::channel();
        match self.admit(&request, tx) {
            Admission::Joined(leader) => {
                debug!(request_id = %request.id, %leader, "deduplicated");
                self.emit(&request, RequestEventKind::Deduplicated { leader });
            }
            Admission::Deferred => {
                info!(request_id = %request.id, "offline, request deferred");
                self.emit(&request, RequestEventKind::Deferred);
            }
            admission => self.launch(Arc::clone(&request), admission),
        }

        rx.await.unwrap_or_else(|_| Envelope::aborted())
    }

    fn admit(
        &self,
        request: &Arc<MaterializedRequest>,
        waiter: oneshot::Sender<Envelope>,
    ) -> Admission {
        let mut guard = self.inner.state.lock().expect("dispatch state lock poisoned");
        let state = &mut *guard;
        let config = &request.config;
        let mut waiter = waiter;

        if config.deduplicate {
            let leader = state
                .in_flight
                .get(&request.keys.cache)
                .filter(|leader| leader.started.elapsed() <= config.deduplicate_time)
                .map(|leader| leader.request_id);
            if let Some(leader) = leader {
                if let Some(record) = state.pending.get_mut(&leader) {
                    match record.join(waiter) {
                        Ok(()) => {
                            debug!(%leader, waiters = record.waiters(), "joined in-flight request");
                            return Admission::Joined(leader);
                        }
                        Err(returned) => waiter = returned,
                    }
                }
            }
        }

        let gate = Arc::new(ResponseGate::new(self.inner.cancel.child_token()));
        state.pending.insert(
            request.id,
            PendingRequest::new(Arc::clone(request), gate, waiter),
        );
        state
            .in_flight
            .insert(request.keys.cache.clone(), InFlight::new(request.id));

        if config.offline && !*self.inner.online.borrow() {
            state.offline.push(Arc::clone(request));
            return Admission::Deferred;
        }
        schedule(state, request)
    }

    fn launch(&self, request: Arc<MaterializedRequest>, admission: Admission) {
        match admission {
            Admission::Queued { start } => {
                debug!(request_id = %request.id, queue_key = %request.keys.queue, "enqueued");
                self.emit(&request, RequestEventKind::Enqueued);
                if start {
                    let this = self.clone();
                    let queue_key = request.keys.queue.clone();
                    tokio::spawn(async move { this.drain(queue_key).await });
                }
            }
            Admission::Immediate => {
                let this = self.clone();
                tokio::spawn(async move { this.supervise(request).await });
            }
            Admission::Joined(_) | Admission::Deferred => {}
        }
    }

    async fn drain(&self, queue_key: String) {
        debug!(%queue_key, "queue draining");
        loop {
            let next = {
                let mut state = self.inner.state.lock().expect("dispatch state lock poisoned");
                let next = state
                    .queues
                    .get_mut(&queue_key)
                    .and_then(Queue::next_entry);
                if next.is_none()
                    && state
                        .queues
                        .get(&queue_key)
                        .is_some_and(Queue::is_disposable)
                {
                    state.queues.remove(&queue_key);
                }
                next
            };
            let Some(request) = next else {
                break;
            };
            self.supervise(request).await;
        }
        debug!(%queue_key, "queue idle");
    }

    /// Run `request` on a task of its own. If that task dies, the request
    /// settles with an internal error and its queue lane moves on.
    async fn supervise(&self, request: Arc<MaterializedRequest>) {
        let request_id = request.id;
        let this = self.clone();
        let Err(err) = tokio::spawn(async move { this.run(request).await }).await else {
            return;
        };
        error!(%request_id, error = %err, "request task failed");

        if let Some(mut record) = self.take(request_id) {
            let envelope = Envelope::failure(
                RequestError::Internal {
                    message: err.to_string(),
                },
                STATUS_NO_RESPONSE,
            );
            record.gate.close(|| {
                self.emit(
                    &record.request,
                    RequestEventKind::Response(envelope.clone()),
                );
            });
            record.settle(envelope);
        }
    }

    async fn run(&self, request: Arc<MaterializedRequest>) {
        let gate = {
            let state = self.inner.state.lock().expect("dispatch state lock poisoned");
            match state.pending.get(&request.id) {
                Some(record) => Arc::clone(&record.gate),
                // Aborted while waiting.
                None => return,
            }
        };
        let cancel = gate.token().clone();

        let (envelope, emissions) = self.execute_with_retry(&request, &gate).await;
        if cancel.is_cancelled() {
            return;
        }

        if envelope.is_success() && request.config.cache {
            self.inner.cache.write(
                &request.keys.cache,
                envelope.clone(),
                request.config.cache_time,
                request.config.garbage_collection,
            );
        }
        if let Some(emissions) = emissions {
            self.follow(&request, cancel, emissions);
        }

        self.settle(request.id, envelope);
    }

    /// Register a live subscription, then forward its emissions until it is
    /// cancelled or the backend closes the stream. The entry is removed when
    /// forwarding stops.
    fn follow(
        &self,
        request: &MaterializedRequest,
        cancel: CancellationToken,
        emissions: Emissions,
    ) {
        let request_id = request.id;
        self.inner.subscriptions.insert(
            request_id,
            LiveSubscription {
                abort_key: request.keys.abort.clone(),
                cancel: cancel.clone(),
            },
        );

        let inner: Weak<DispatcherInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            emissions.forward(cancel).await;
            if let Some(inner) = inner.upgrade() {
                if inner.subscriptions.remove(&request_id).is_some() {
                    debug!(%request_id, "subscription ended");
                }
            }
        });
    }

    async fn execute_with_retry(
        &self,
        request: &MaterializedRequest,
        gate: &Arc<ResponseGate>,
    ) -> (Envelope, Option<Emissions>) {
        let cancel = gate.token();
        let retries = request.config.retry;
        let mut attempt = 0;
        loop {
            let (envelope, emissions) = self.attempt(request, gate).await;
            if envelope.is_success() || cancel.is_cancelled() {
                return (envelope, emissions);
            }
            let retryable = envelope.error().is_some_and(RequestError::is_retryable);
            if !retryable || attempt >= retries {
                return (envelope, None);
            }

            attempt += 1;
            warn!(
                request_id = %request.id,
                attempt,
                remaining = retries - attempt,
                status = envelope.status(),
                "request failed, retrying"
            );
            self.emit(
                request,
                RequestEventKind::Retry {
                    attempt,
                    remaining: retries - attempt,
                },
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return (Envelope::aborted(), None),
                () = tokio::time::sleep(request.config.retry_time) => {}
            }
        }
    }

    async fn attempt(
        &self,
        request: &MaterializedRequest,
        gate: &Arc<ResponseGate>,
    ) -> (Envelope, Option<Emissions>) {
        let cancel = gate.token();
        let sink = Arc::new(BusSink::new(
            self.inner.events.clone(),
            request.id,
            Arc::clone(&request.keys),
            Arc::clone(gate),
        ));
        let (envelope, emissions) = match request.mock {
            Some(ref mock) => (mock.respond(request, sink.as_ref(), cancel).await, None),
            None => {
                self.inner
                    .adapter
                    .execute(request, sink, cancel, &self.inner.interceptors)
                    .await
            }
        };
        if envelope.is_aborted() {
            return (envelope, None);
        }
        let envelope = self.inner.interceptors.finish(envelope, &request.config);
        // A first emission rejected by the interceptors ends the subscription.
        let emissions = emissions.filter(|_| envelope.is_success());
        (envelope, emissions)
    }

    fn settle(&self, request_id: RequestId, envelope: Envelope) {
        if let Some(mut record) = self.take(request_id) {
            debug!(%request_id, status = envelope.status(), "request settled");
            record.settle(envelope);
        }
    }

    /// Remove a pending record and release its dedupe slot.
    fn take(&self, request_id: RequestId) -> Option<PendingRequest> {
        let mut guard = self.inner.state.lock().expect("dispatch state lock poisoned");
        let state = &mut *guard;
        let record = state.pending.remove(&request_id);
        if let Some(ref record) = record {
            release_in_flight(state, record);
        }
        record
    }

    // ── Abort ────────────────────────────────────────────────────

    /// Terminate every pending, queued, deferred, or in-flight request and
    /// every live subscription sharing `abort_key`. Returns how many were
    /// terminated.
    pub(crate) fn abort(&self, abort_key: &str) -> usize {
        let aborted: Vec<PendingRequest> = {
            let mut guard = self.inner.state.lock().expect("dispatch state lock poisoned");
            let state = &mut *guard;
            for queue in state.queues.values_mut() {
                queue.retain(|request| request.keys.abort != abort_key);
            }
            state
                .offline
                .retain(|request| request.keys.abort != abort_key);

            let ids: Vec<RequestId> = state
                .pending
                .iter()
                .filter(|(_, record)| record.request.keys.abort == abort_key)
                .map(|(id, _)| *id)
                .collect();
            let records: Vec<PendingRequest> = ids
                .iter()
                .filter_map(|id| state.pending.remove(id))
                .collect();
            for record in &records {
                release_in_flight(state, record);
            }
            records
        };

        let mut terminated = aborted.len();
        self.inner.subscriptions.retain(|id, subscription| {
            if subscription.abort_key != abort_key {
                return true;
            }
            subscription.cancel.cancel();
            if !aborted.iter().any(|record| record.request.id == *id) {
                terminated += 1;
            }
            false
        });

        for mut record in aborted {
            record
                .gate
                .close(|| self.emit(&record.request, RequestEventKind::Abort));
            record.settle(Envelope::aborted());
        }

        if terminated > 0 {
            info!(%abort_key, terminated, "aborted requests");
        }
        terminated
    }

    /// Stop forwarding emissions of one subscription.
    pub(crate) fn unsubscribe(&self, request_id: RequestId) -> bool {
        match self.inner.subscriptions.remove(&request_id) {
            Some((_, subscription)) => {
                subscription.cancel.cancel();
                debug!(%request_id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    // ── Connectivity ─────────────────────────────────────────────

    pub(crate) fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    pub(crate) fn online_watch(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    /// Flip connectivity. Going online replays deferred requests in their
    /// original order with their original ids and keys.
    pub(crate) fn set_online(&self, online: bool) {
        let changed = self.inner.online.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if !changed {
            return;
        }
        info!(online, "connectivity changed");
        if !online {
            return;
        }

        let replay: Vec<(Arc<MaterializedRequest>, Admission)> = {
            let mut guard = self.inner.state.lock().expect("dispatch state lock poisoned");
            let state = &mut *guard;
            let buffered = std::mem::take(&mut state.offline);
            let mut replay = Vec::with_capacity(buffered.len());
            for request in buffered {
                if state.pending.contains_key(&request.id) {
                    let admission = schedule(state, &request);
                    replay.push((request, admission));
                }
            }
            replay
        };
        if !replay.is_empty() {
            info!(count = replay.len(), "replaying deferred requests");
        }
        for (request, admission) in replay {
            self.launch(request, admission);
        }
    }

    // ── Queue control ────────────────────────────────────────────

    /// Pause draining after the entry currently executing.
    pub(crate) fn stop_queue(&self, queue_key: &str) {
        let mut state = self.inner.state.lock().expect("dispatch state lock poisoned");
        state.queues.entry(queue_key.to_owned()).or_default().stop();
        debug!(%queue_key, "queue stopped");
    }

    pub(crate) fn start_queue(&self, queue_key: &str) {
        let start = {
            let mut state = self.inner.state.lock().expect("dispatch state lock poisoned");
            match state.queues.get_mut(queue_key) {
                Some(queue) => queue.start(),
                None => false,
            }
        };
        debug!(%queue_key, "queue started");
        if start {
            let this = self.clone();
            let queue_key = queue_key.to_owned();
            tokio::spawn(async move { this.drain(queue_key).await });
        }
    }

    pub(crate) fn queue_status(&self, queue_key: &str) -> QueueStatus {
        let state = self.inner.state.lock().expect("dispatch state lock poisoned");
        state
            .queues
            .get(queue_key)
            .map_or(QueueStatus::Idle, Queue::status)
    }

    /// Entries waiting behind the one currently executing.
    pub(crate) fn queue_len(&self, queue_key: &str) -> usize {
        let state = self.inner.state.lock().expect("dispatch state lock poisoned");
        state.queues.get(queue_key).map_or(0, Queue::len)
    }

    pub(crate) fn pending_count(&self) -> usize {
        let state = self.inner.state.lock().expect("dispatch state lock poisoned");
        state.pending.len()
    }

    /// Abort everything and stop all subscriptions.
    pub(crate) fn shutdown(&self) {
        let records: Vec<PendingRequest> = {
            let mut state = self.inner.state.lock().expect("dispatch state lock poisoned");
            state.queues.clear();
            state.offline.clear();
            state.in_flight.clear();
            state.pending.drain().map(|(_, record)| record).collect()
        };
        for mut record in records {
            record
                .gate
                .close(|| self.emit(&record.request, RequestEventKind::Abort));
            record.settle(Envelope::aborted());
        }
        self.inner.cancel.cancel();
        self.inner.subscriptions.clear();
        info!("dispatcher shut down");
    }

    fn emit(&self, request: &MaterializedRequest, kind: RequestEventKind) {
        let _ = self.inner.events.send(RequestEvent {
            request_id: request.id,
            keys: Arc::clone(&request.keys),
            kind,
        });
    }
}

fn schedule(state: &mut DispatchState, request: &Arc<MaterializedRequest>) -> Admission {
    if !request.config.queued {
        return Admission::Immediate;
    }
    let start = state
        .queues
        .entry(request.keys.queue.clone())
        .or_default()
        .push(Arc::clone(request));
    Admission::Queued { start }
}

fn release_in_flight(state: &mut DispatchState, record: &PendingRequest) {
    let key = &record.request.keys.cache;
    if state
        .in_flight
        .get(key)
        .is_some_and(|leader| leader.request_id == record.request.id)
    {
        state.in_flight.remove(key);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("adapter", &self.inner.adapter)
            .field("online", &*self.inner.online.borrow())
            .field("subscriptions", &self.inner.subscriptions.len())
            .finish_non_exhaustive()
    }
}
