//! In-process engine simulator for tests.

use crate::error::TransportError;
use crate::frame::{ClientFrame, EngineFrame, JoinFrame};
use crate::transport::{Connection, Transport};
use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use junction_types::{InboundEvent, OutboundResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// A [`Transport`] whose connections terminate in a [`SimulatedEngine`].
#[derive(Clone)]
pub struct ChannelTransport {
    shared: Arc<Shared>,
    accept: mpsc::UnboundedSender<EngineConnection>,
}

struct Shared {
    refuse: AtomicUsize,
    opened: AtomicUsize,
}

/// The engine end of a [`ChannelTransport`].
pub struct SimulatedEngine {
    shared: Arc<Shared>,
    accept: mpsc::UnboundedReceiver<EngineConnection>,
}

/// One accepted connection, seen from the engine.
pub struct EngineConnection {
    to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Create a transport and the engine it connects to.
    pub fn pair() -> (Self, SimulatedEngine) {
        let shared = Arc::new(Shared {
            refuse: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                shared: Arc::clone(&shared),
                accept: tx,
            },
            SimulatedEngine { shared, accept: rx },
        )
    }
}

fn refused() -> TransportError {
    TransportError::Connect {
        endpoint: "channel".into(),
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "engine refused"),
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&self) -> Result<Connection, TransportError> {
        let refusing = self
            .shared
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refusing {
            return Err(refused());
        }

        let (to_client, client_reader) = fmpsc::unbounded();
        let (client_writer, from_client) = fmpsc::unbounded();
        self.accept
            .send(EngineConnection {
                to_client,
                from_client,
            })
            .map_err(|_| refused())?;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Connection {
            reader: Box::pin(client_reader),
            writer: Box::pin(client_writer.sink_map_err(|_| TransportError::Closed)),
        })
    }

    fn endpoint(&self) -> &str {
        "channel"
    }
}

impl SimulatedEngine {
    /// Wait for the client's next connection.
    pub async fn accept(&mut self) -> Option<EngineConnection> {
        self.accept.recv().await
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: usize) {
        self.shared.refuse.store(n, Ordering::SeqCst);
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }
}

impl EngineConnection {
    /// Send a frame to the client.
    pub fn send(&self, frame: &EngineFrame) {
        if let Ok(line) = frame.encode() {
            self.send_raw(line);
        }
    }

    /// Push an event to the client.
    pub fn send_event(&self, event: InboundEvent) {
        self.send(&EngineFrame::Event(event));
    }

    /// Send an arbitrary line.
    pub fn send_raw(&self, line: impl Into<String>) {
        let _ = self.to_client.unbounded_send(Ok(line.into()));
    }

    /// Break the connection with an I/O error.
    pub fn fail(self) {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by engine");
        let _ = self.to_client.unbounded_send(Err(TransportError::Io(reset)));
    }

    /// Next frame from the client. `None` once the client closed its side.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        loop {
            let line = self.from_client.next().await?;
            match ClientFrame::decode(&line) {
                Ok(frame) => return Some(frame),
                Err(err) => tracing::warn!(error = %err, "simulated engine got a bad frame"),
            }
        }
    }

    /// Next join frame, skipping anything else.
    pub async fn recv_join(&mut self) -> Option<JoinFrame> {
        loop {
            if let ClientFrame::Join(join) = self.recv().await? {
                return Some(join);
            }
        }
    }

    /// Next result frame, skipping anything else.
    pub async fn recv_result(&mut self) -> Option<OutboundResult> {
        loop {
            if let ClientFrame::Result(result) = self.recv().await? {
                return Some(result);
            }
        }
    }
}
