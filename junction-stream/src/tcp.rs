//! Newline-delimited frames over TCP.

use crate::error::TransportError;
use crate::transport::{Connection, Transport};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

/// Default upper bound on one inbound frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials the engine over TCP.
///
/// The endpoint is `host:port`, optionally prefixed with `tcp://`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: String,
    max_frame_bytes: usize,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Reject inbound lines longer than `max` bytes.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Give up on a connection attempt after `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn address(&self) -> &str {
        self.endpoint
            .strip_prefix("tcp://")
            .unwrap_or(&self.endpoint)
    }

    fn connect_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Connect {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self) -> Result<Connection, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.address()))
            .await
            .map_err(|_| {
                self.connect_error(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ))
            })?
            .map_err(|err| self.connect_error(err))?;
        stream.set_nodelay(true)?;

        let max = self.max_frame_bytes;
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(max));
        let (writer, reader) = framed.split::<String>();
        tracing::debug!(endpoint = %self.endpoint, "tcp connection open");

        Ok(Connection {
            reader: Box::pin(reader.map(move |line| {
                line.map_err(|err| TransportError::from_codec(err, max))
            })),
            writer: Box::pin(writer.sink_map_err(move |err| TransportError::from_codec(err, max))),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
