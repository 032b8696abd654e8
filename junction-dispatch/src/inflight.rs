//! Bookkeeping for dispatched events that have not produced a result yet.

use junction_types::{EntityId, ErrorCode, EventId, HandlerKind, InboundEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why in-flight work was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The drain timeout elapsed during shutdown.
    Shutdown,
    /// The connection to the engine failed.
    Transport,
}

impl CancelReason {
    /// The error code reported for work cancelled for this reason.
    pub fn error_code(self) -> ErrorCode {
        match self {
            Self::Shutdown => ErrorCode::ShutdownError,
            Self::Transport => ErrorCode::TransportError,
        }
    }

    /// Message reported alongside the error code.
    pub fn message(self) -> &'static str {
        match self {
            Self::Shutdown => "cancelled: drain timeout elapsed during shutdown",
            Self::Transport => "cancelled: connection to the engine was lost",
        }
    }
}

/// Cancellation handle for one dispatch. The first reason given wins.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelHandle {
    /// Create an uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves with the reason once cancellation is requested.
    pub async fn cancelled(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason.get().copied().unwrap_or(CancelReason::Shutdown)
    }
}

/// Identifies one registration in the [`InFlightTable`].
///
/// Distinct from the event id: the engine may redeliver an event whose
/// first delivery is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// A dispatched event awaiting its result.
#[derive(Debug, Clone)]
pub struct InFlightRequest {
    /// Event being handled.
    pub event_id: EventId,
    /// Entity the event concerns.
    pub entity_id: EntityId,
    /// Kind of the handler.
    pub handler_kind: HandlerKind,
    /// Name of the handler.
    pub handler_name: String,
    /// When the event was admitted to the worker pool.
    pub started_at: Instant,
    /// Cancels the handler.
    pub cancel: CancelHandle,
}

/// Thread-safe table of in-flight requests.
#[derive(Debug, Default)]
pub struct InFlightTable {
    next_id: AtomicU64,
    entries: Mutex<HashMap<RequestId, InFlightRequest>>,
}

impl InFlightTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `event` until [`complete`](Self::complete) is called.
    pub fn register(&self, event: &InboundEvent, cancel: CancelHandle) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = InFlightRequest {
            event_id: event.event_id.clone(),
            entity_id: event.entity_id.clone(),
            handler_kind: event.handler_kind,
            handler_name: event.handler_name.clone(),
            started_at: Instant::now(),
            cancel,
        };
        self.lock().insert(id, request);
        id
    }

    /// Stop tracking a request.
    pub fn complete(&self, id: RequestId) -> Option<InFlightRequest> {
        self.lock().remove(&id)
    }

    /// Cancel every tracked request. Returns how many were signalled.
    ///
    /// Entries stay in the table until their dispatch reports a result.
    pub fn cancel_all(&self, reason: CancelReason) -> usize {
        let entries = self.lock();
        for request in entries.values() {
            request.cancel.cancel(reason);
        }
        entries.len()
    }

    /// Copy of the tracked requests, oldest first.
    pub fn snapshot(&self) -> Vec<InFlightRequest> {
        let mut requests: Vec<InFlightRequest> = self.lock().values().cloned().collect();
        requests.sort_by_key(|r| r.started_at);
        requests
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, InFlightRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
