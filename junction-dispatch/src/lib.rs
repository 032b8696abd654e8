#![deny(missing_docs)]
//! Event dispatch for junction.
//!
//! A [`Dispatcher`] takes inbound events, resolves each against the
//! [`HandlerRegistry`](junction_registry::HandlerRegistry), and runs the
//! handler under an [`ExecutionSupervisor`]. Every admitted event yields
//! exactly one [`OutboundResult`](junction_types::OutboundResult) through
//! the configured [`ResultSink`].
//!
//! Ordering: events for one entity run strictly one after another through
//! [`KeyedLocks`]; a timed-out or cancelled handler keeps the entity until
//! its task has stopped. Events for different entities run concurrently,
//! bounded by the worker pool. No global lock is held while a handler runs.
//!
//! Shutdown is two-phase: stop intake (the stop token given to
//! [`Dispatcher::run`]), then [`Dispatcher::drain`].

mod dispatcher;
mod inflight;
mod locks;
mod supervisor;

pub use dispatcher::{
    DEFAULT_WORKER_POOL_SIZE, DispatchConfig, Dispatcher, DrainReport, IntakeEnd, ResultSink,
};
pub use inflight::{CancelHandle, CancelReason, InFlightRequest, InFlightTable, RequestId};
pub use locks::{EntityGuard, KeyedLocks};
pub use supervisor::{DEFAULT_HANDLER_TIMEOUT, ExecutionSupervisor};
