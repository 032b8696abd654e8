//! The byte channel under the stream client.

use crate::error::TransportError;
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

/// Inbound lines of one connection. Ends on EOF.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Outbound lines of one connection.
pub type LineSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Both halves of an open connection.
pub struct Connection {
    /// Lines from the engine.
    pub reader: LineStream,
    /// Lines to the engine.
    pub writer: LineSink,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens line-framed connections to the engine.
///
/// Implementations:
/// - [`TcpTransport`](crate::TcpTransport): newline-delimited frames over TCP
/// - `ChannelTransport`: in-process engine simulator (test-utils)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection.
    async fn open(&self) -> Result<Connection, TransportError>;

    /// Where this transport connects, for logs.
    fn endpoint(&self) -> &str;
}
