//! The dispatch loop: admission, per-entity ordering, and result delivery.

use crate::inflight::{CancelHandle, CancelReason, InFlightRequest, InFlightTable};
use crate::locks::KeyedLocks;
use crate::supervisor::{DEFAULT_HANDLER_TIMEOUT, ExecutionSupervisor};
use futures::{Stream, StreamExt};
use junction_registry::{HandlerDescriptor, HandlerRegistry};
use junction_types::{ErrorCode, InboundEvent, OutboundResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Default number of handlers allowed to run at once.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 16;

/// Receives every result the dispatcher produces.
///
/// Delivery is synchronous and must not block; implementations queue the
/// result and return.
pub trait ResultSink: Send + Sync + 'static {
    /// Hand over one result.
    fn deliver(&self, result: OutboundResult);
}

impl ResultSink for mpsc::UnboundedSender<OutboundResult> {
    fn deliver(&self, result: OutboundResult) {
        if let Err(err) = self.send(result) {
            tracing::warn!(event_id = %err.0.event_id, "result receiver closed, result dropped");
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running handlers.
    pub worker_pool_size: usize,
    /// Deadline for handlers that declare none.
    pub handler_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

/// Why [`Dispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeEnd {
    /// The event stream ended.
    Exhausted,
    /// The stop token fired.
    Stopped,
}

/// Outcome of [`Dispatcher::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests still running when the drain timeout elapsed, and therefore
    /// cancelled with `SHUTDOWN_ERROR`.
    pub forced: usize,
}

impl DrainReport {
    /// True when every request finished on its own.
    pub fn is_clean(&self) -> bool {
        self.forced == 0
    }
}

/// Routes inbound events to handlers and reports exactly one result each.
///
/// Events for the same entity run one at a time, in no guaranteed order;
/// events for different entities run in parallel up to the worker pool size.
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<HandlerRegistry>,
    supervisor: ExecutionSupervisor,
    sink: Arc<dyn ResultSink>,
    locks: Arc<KeyedLocks>,
    inflight: InFlightTable,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    closing: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher over a loaded registry.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        sink: Arc<dyn ResultSink>,
        config: DispatchConfig,
    ) -> Self {
        let pool = config.worker_pool_size.max(1);
        Self {
            inner: Arc::new(Inner {
                registry,
                supervisor: ExecutionSupervisor::new(config.handler_timeout),
                sink,
                locks: Arc::new(KeyedLocks::new()),
                inflight: InFlightTable::new(),
                permits: Arc::new(Semaphore::new(pool)),
                tracker: TaskTracker::new(),
                closing: CancellationToken::new(),
            }),
        }
    }

    /// Pull events from `events` and dispatch them until the stream ends or
    /// `stop` fires.
    ///
    /// Only the wait for the next event races against `stop`; an event that
    /// was taken from the stream is always dispatched, so none is lost.
    pub async fn run<S>(&self, mut events: S, stop: &CancellationToken) -> IntakeEnd
    where
        S: Stream<Item = InboundEvent> + Unpin,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => return IntakeEnd::Stopped,
                next = events.next() => next,
            };
            match next {
                Some(event) => self.admit(event, Some(stop)).await,
                None => return IntakeEnd::Exhausted,
            }
        }
    }

    /// Dispatch one event.
    ///
    /// Returns once the event holds a worker slot; the handler itself runs
    /// in the background and its result goes to the sink.
    pub async fn dispatch(&self, event: InboundEvent) {
        self.admit(event, None).await;
    }

    /// Cancel every in-flight handler. Each reports an error result with
    /// the code for `reason`. Returns how many were signalled.
    pub fn cancel_in_flight(&self, reason: CancelReason) -> usize {
        let count = self.inner.inflight.cancel_all(reason);
        if count > 0 {
            tracing::warn!(count, reason = ?reason, "cancelling in-flight handlers");
        }
        count
    }

    /// Wait for in-flight work to finish, up to `timeout`.
    ///
    /// Work still running when the timeout elapses is cancelled with
    /// `SHUTDOWN_ERROR`. Either way every admitted event has produced its
    /// result by the time this returns. Events still waiting for a worker
    /// slot are refused with `SHUTDOWN_ERROR`.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let inner = &self.inner;
        inner.closing.cancel();
        inner.tracker.close();
        tracing::info!(
            in_flight = inner.inflight.len(),
            timeout_ms = timeout.as_millis() as u64,
            "draining dispatcher"
        );

        if tokio::time::timeout(timeout, inner.tracker.wait())
            .await
            .is_ok()
        {
            tracing::info!("dispatcher drained");
            return DrainReport { forced: 0 };
        }

        let forced = inner.inflight.cancel_all(CancelReason::Shutdown);
        tracing::warn!(forced, "drain timeout elapsed, cancelled remaining handlers");
        inner.tracker.wait().await;
        DrainReport { forced }
    }

    /// Requests currently in flight, oldest first.
    pub fn in_flight(&self) -> Vec<InFlightRequest> {
        self.inner.inflight.snapshot()
    }

    /// True when no request is in flight.
    pub fn idle(&self) -> bool {
        self.inner.inflight.is_empty()
    }

    /// The registry events are resolved against.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    async fn admit(&self, event: InboundEvent, stop: Option<&CancellationToken>) {
        let inner = &self.inner;
        let descriptor = match inner
            .registry
            .lookup(event.handler_kind, &event.handler_name)
        {
            Ok(descriptor) => descriptor.clone(),
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    entity_id = %event.entity_id,
                    error = %err,
                    "no handler for event"
                );
                inner.sink.deliver(OutboundResult::not_found(&event));
                return;
            }
        };

        let slot = ResultSlot::new(Arc::clone(&inner.sink), &event);
        let Some(permit) = self.acquire_permit(stop).await else {
            slot.send(OutboundResult::error(
                &event,
                ErrorCode::ShutdownError,
                "refused: dispatcher is shutting down",
            ));
            return;
        };

        let cancel = CancelHandle::new();
        let request = inner.inflight.register(&event, cancel.clone());
        let span = tracing::info_span!(
            "dispatch",
            event_id = %event.event_id,
            entity_id = %event.entity_id,
            handler = %event.handler_name,
            kind = %event.handler_kind,
        );
        let tracker = inner.tracker.clone();
        let inner = Arc::clone(inner);
        tracker.spawn(
            async move {
                let _permit = permit;
                let result = inner.execute(&descriptor, &event, &cancel).await;
                inner.inflight.complete(request);
                tracing::debug!(status = ?result.status, "event handled");
                slot.send(result);
            }
            .instrument(span),
        );
    }

    async fn acquire_permit(&self, stop: Option<&CancellationToken>) -> Option<OwnedSemaphorePermit> {
        let inner = &self.inner;
        let stopped = async {
            match stop {
                Some(stop) => stop.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = inner.closing.cancelled() => None,
            _ = stopped => None,
            permit = Arc::clone(&inner.permits).acquire_owned() => permit.ok(),
        }
    }
}

impl Inner {
    async fn execute(
        &self,
        descriptor: &HandlerDescriptor,
        event: &InboundEvent,
        cancel: &CancelHandle,
    ) -> OutboundResult {
        let _guard = tokio::select! {
            guard = self.locks.acquire(&event.entity_id) => guard,
            reason = cancel.cancelled() => {
                return OutboundResult::error(event, reason.error_code(), reason.message());
            }
        };
        self.supervisor.execute(descriptor, event, cancel).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.inner.registry)
            .field("in_flight", &self.inner.inflight.len())
            .field("available_workers", &self.inner.permits.available_permits())
            .finish()
    }
}

/// Guarantees a result for an admitted event.
///
/// If the slot is dropped without [`send`](Self::send), for example because
/// the dispatch future was abandoned, a `SHUTDOWN_ERROR` result is
/// delivered in its place.
struct ResultSlot {
    sink: Arc<dyn ResultSink>,
    fallback: Option<OutboundResult>,
}

impl ResultSlot {
    fn new(sink: Arc<dyn ResultSink>, event: &InboundEvent) -> Self {
        Self {
            sink,
            fallback: Some(OutboundResult::error(
                event,
                ErrorCode::ShutdownError,
                "dispatch abandoned before the handler reported",
            )),
        }
    }

    fn send(mut self, result: OutboundResult) {
        self.fallback = None;
        self.sink.deliver(result);
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            tracing::warn!(event_id = %fallback.event_id, "dispatch abandoned, reporting shutdown");
            self.sink.deliver(fallback);
        }
    }
}
