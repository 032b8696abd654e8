#![deny(missing_docs)]
//! Engine connection for junction.
//!
//! The [`StreamClient`] keeps one authenticated connection to the workflow
//! engine, turns inbound frames into events for a
//! [`Dispatcher`](junction_dispatch::Dispatcher), and writes results back.
//!
//! | Concern | Types |
//! |---------|-------|
//! | Lifecycle | [`StreamSession`], [`SessionState`] |
//! | Retry | [`ReconnectPolicy`] |
//! | Wire | [`ClientFrame`], [`EngineFrame`], [`JoinFrame`] |
//! | Byte channel | [`Transport`], [`TcpTransport`] |
//! | Outbound queue | [`Outbox`] |
//!
//! The `test-utils` feature adds `ChannelTransport`, an in-process engine
//! simulator.

mod backoff;
mod client;
mod error;
mod frame;
mod outbox;
mod session;
mod tcp;
mod transport;

#[cfg(feature = "test-utils")]
pub mod channel;

pub use backoff::{
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, ReconnectPolicy,
};
pub use client::{DEFAULT_DRAIN_TIMEOUT, EventStream, StreamClient, StreamConfig, StreamEnd};
pub use error::{StreamError, TransportError};
pub use frame::{ClientFrame, EngineFrame, FrameError, JoinFrame};
pub use outbox::Outbox;
pub use session::{SessionState, StreamSession};
pub use tcp::{DEFAULT_MAX_FRAME_BYTES, TcpTransport};
pub use transport::{Connection, LineSink, LineStream, Transport};
