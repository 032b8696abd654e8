//! The stream client: one long-lived engine connection feeding a dispatcher.

use crate::backoff::ReconnectPolicy;
use crate::error::{StreamError, TransportError};
use crate::frame::{ClientFrame, EngineFrame, JoinFrame};
use crate::outbox::Outbox;
use crate::session::{SessionState, StreamSession};
use crate::transport::{Connection, LineSink, LineStream, Transport};
use futures::{SinkExt, Stream};
use junction_auth::{AuthProvider, AuthRequest};
use junction_dispatch::{CancelReason, Dispatcher, IntakeEnd, ResultSink};
use junction_types::{InboundEvent, OutboundResult};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Default time allowed for in-flight work during shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const WRITER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Stream client settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Member id sent in the join frame.
    pub member_id: String,
    /// Routing tags sent in the join frame.
    pub tags: Vec<String>,
    /// Backoff for the initial connect and for reconnects.
    pub reconnect: ReconnectPolicy,
    /// Time allowed for in-flight work, and then for flushing results,
    /// during shutdown.
    pub drain_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            member_id: "junction".into(),
            tags: Vec::new(),
            reconnect: ReconnectPolicy::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Maintains the engine connection and moves frames between it and a
/// [`Dispatcher`].
///
/// Results travel through an [`Outbox`] owned by the client, so results
/// produced while the connection is down are written after the next
/// successful connect. Hand [`result_sink`](Self::result_sink) to the
/// dispatcher.
pub struct StreamClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    config: StreamConfig,
    session: StreamSession,
    outbox: Outbox,
    active: Option<ActiveConnection>,
}

struct ActiveConnection {
    reader: Option<LineStream>,
    writer: JoinHandle<WriterExit>,
    /// Stop writing now.
    abort: CancellationToken,
    /// Stop once the outbox is empty.
    finish: CancellationToken,
    /// Cancelled by the writer when a write fails.
    failed: CancellationToken,
}

struct WriterExit {
    sink: LineSink,
    error: Option<TransportError>,
}

enum Attempt {
    Initial,
    Reconnect,
}

impl StreamClient {
    /// Create a disconnected client.
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            session: StreamSession::new(),
            outbox: Outbox::new(),
            active: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Observe session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// The sink a [`Dispatcher`] should report results to.
    pub fn result_sink(&self) -> Arc<dyn ResultSink> {
        Arc::new(self.outbox.clone())
    }

    /// Frames waiting to be written.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Queue a result for the engine.
    ///
    /// Results from one caller are written in the order queued.
    pub fn send(&self, result: OutboundResult) {
        self.outbox.push(ClientFrame::Result(result));
    }

    /// Make one connection attempt: fetch a token, open the transport, and
    /// send the join frame.
    pub async fn connect(&mut self) -> Result<(), StreamError> {
        self.session.transition(SessionState::Connecting)?;
        match self.open_connection().await {
            Ok(()) => {
                self.session.transition(SessionState::Connected)?;
                tracing::info!(
                    endpoint = self.transport.endpoint(),
                    member_id = %self.config.member_id,
                    "connected to engine"
                );
                Ok(())
            }
            Err(err) => {
                self.session.transition(SessionState::Disconnected)?;
                Err(err)
            }
        }
    }

    /// Events from the current connection.
    ///
    /// The stream ends when the connection fails or closes; after a
    /// reconnect, call again for the new connection's events. Keep-alives
    /// are answered and greetings logged without surfacing here.
    pub fn receive(&mut self) -> Result<EventStream, StreamError> {
        let active = self.active.as_mut().ok_or(StreamError::NotConnected)?;
        let reader = active.reader.take().ok_or(StreamError::NotConnected)?;
        Ok(EventStream {
            reader,
            outbox: self.outbox.clone(),
            writer_failed: Box::pin(active.failed.clone().cancelled_owned()),
            end: None,
        })
    }

    /// Feed `dispatcher` from the engine until `shutdown` fires or the
    /// connection is lost for good.
    ///
    /// Connects first if needed. On connection loss, in-flight work is
    /// cancelled with `TRANSPORT_ERROR` and the client reconnects with
    /// backoff. On shutdown, intake stops, the dispatcher drains, queued
    /// results are flushed, and the connection is closed.
    ///
    /// Returns [`StreamError::ReconnectExhausted`] when every attempt
    /// failed.
    pub async fn run(
        &mut self,
        dispatcher: &Dispatcher,
        shutdown: &CancellationToken,
    ) -> Result<(), StreamError> {
        if self.active.is_none() && !self.connect_with_retry(Attempt::Initial, shutdown).await? {
            tracing::info!("shutdown requested before the engine connection was established");
            return Ok(());
        }

        loop {
            let mut events = self.receive()?;
            let end = dispatcher.run(&mut events, shutdown).await;
            if end == IntakeEnd::Stopped || shutdown.is_cancelled() {
                drop(events);
                return self.drain(dispatcher).await;
            }

            let cause = self.disconnect(events).await;
            tracing::warn!(error = %cause, "lost connection to engine");
            self.session.transition(SessionState::Reconnecting)?;
            dispatcher.cancel_in_flight(CancelReason::Transport);

            match self.connect_with_retry(Attempt::Reconnect, shutdown).await {
                Ok(true) => continue,
                Ok(false) => return self.drain(dispatcher).await,
                Err(err) => {
                    dispatcher.drain(self.config.drain_timeout).await;
                    return Err(err);
                }
            }
        }
    }

    /// Retry connecting under the reconnect policy. Returns `false` if
    /// `shutdown` fired first.
    async fn connect_with_retry(
        &mut self,
        mode: Attempt,
        shutdown: &CancellationToken,
    ) -> Result<bool, StreamError> {
        let policy = self.config.reconnect;
        let attempts = policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let backoff = match mode {
                Attempt::Reconnect => Some(policy.delay_for(attempt)),
                Attempt::Initial if attempt > 1 => Some(policy.delay_for(attempt - 1)),
                Attempt::Initial => None,
            };
            if let Some(delay) = backoff {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    backoff_ms = delay.as_millis() as u64,
                    "waiting before connecting to engine"
                );
                if !pause(delay, shutdown).await {
                    return Ok(false);
                }
            }

            let outcome = match mode {
                Attempt::Initial => {
                    tokio::select! {
                        result = self.connect() => Some(result),
                        _ = shutdown.cancelled() => None,
                    }
                }
                Attempt::Reconnect => {
                    tokio::select! {
                        result = self.open_connection() => Some(result),
                        _ = shutdown.cancelled() => None,
                    }
                }
            };

            match outcome {
                None => {
                    if self.session.state() == SessionState::Connecting {
                        self.session.transition(SessionState::Disconnected)?;
                    }
                    return Ok(false);
                }
                Some(Ok(())) => {
                    if let Attempt::Reconnect = mode {
                        self.session.transition(SessionState::Connected)?;
                        tracing::info!(
                            attempt,
                            endpoint = self.transport.endpoint(),
                            queued = self.outbox.len(),
                            "reconnected to engine"
                        );
                    }
                    return Ok(true);
                }
                Some(Err(err @ StreamError::IllegalTransition { .. })) => return Err(err),
                Some(Err(err)) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %err, "engine connection attempt failed");
                    last_error = err.to_string();
                }
            }
        }

        self.session.give_up()?;
        tracing::error!(attempts, error = %last_error, "giving up on engine connection");
        Err(StreamError::ReconnectExhausted {
            attempts,
            last_error,
        })
    }

    async fn open_connection(&mut self) -> Result<(), StreamError> {
        let request = AuthRequest::new(self.transport.endpoint(), self.config.member_id.clone());
        let token = self.auth.provide(&request).await?;

        let Connection { reader, mut writer } = self.transport.open().await?;
        let join = ClientFrame::Join(JoinFrame {
            member_id: self.config.member_id.clone(),
            token: token.to_text()?,
            tags: self.config.tags.clone(),
        });
        writer.send(join.encode()?).await?;

        let abort = CancellationToken::new();
        let finish = CancellationToken::new();
        let failed = CancellationToken::new();
        let handle = tokio::spawn(write_frames(
            self.outbox.clone(),
            writer,
            abort.clone(),
            finish.clone(),
            failed.clone(),
        ));
        self.active = Some(ActiveConnection {
            reader: Some(reader),
            writer: handle,
            abort,
            finish,
            failed,
        });
        Ok(())
    }

    /// Tear down a failed connection and work out why it failed.
    async fn disconnect(&mut self, events: EventStream) -> TransportError {
        let end = events.end;
        let writer_error = match self.active.take() {
            Some(active) => {
                active.abort.cancel();
                stop_writer(active.writer).await.and_then(|exit| exit.error)
            }
            None => None,
        };
        match end {
            Some(StreamEnd::Failed(err)) => err,
            Some(StreamEnd::WriterFailed) => writer_error.unwrap_or(TransportError::Closed),
            Some(StreamEnd::Closed) | None => TransportError::Closed,
        }
    }

    async fn drain(&mut self, dispatcher: &Dispatcher) -> Result<(), StreamError> {
        self.session.transition(SessionState::Draining)?;
        let report = dispatcher.drain(self.config.drain_timeout).await;
        if !report.is_clean() {
            tracing::warn!(forced = report.forced, "stragglers reported as shutdown errors");
        }

        self.close_connection().await;
        self.session.transition(SessionState::Disconnected)?;

        let undelivered = self.outbox.len();
        if undelivered > 0 {
            tracing::warn!(undelivered, "stream closed with undelivered frames");
        } else {
            tracing::info!("stream closed");
        }
        Ok(())
    }

    /// Flush the outbox to the current connection, then close it.
    async fn close_connection(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.finish.cancel();

        let mut handle = active.writer;
        let exit = match tokio::time::timeout(self.config.drain_timeout, &mut handle).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "result writer task failed");
                None
            }
            Err(_) => {
                tracing::warn!(queued = self.outbox.len(), "result flush timed out");
                active.abort.cancel();
                stop_writer(handle).await
            }
        };

        if let Some(WriterExit { mut sink, error }) = exit {
            match error {
                Some(err) => tracing::warn!(error = %err, "result flush failed"),
                None => {
                    if let Err(err) = sink.close().await {
                        tracing::debug!(error = %err, "closing engine connection failed");
                    }
                }
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.abort.cancel();
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.transport.endpoint())
            .field("state", &self.session.state())
            .field("outbox", &self.outbox)
            .finish()
    }
}

async fn pause(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.cancelled() => false,
    }
}

async fn stop_writer(mut handle: JoinHandle<WriterExit>) -> Option<WriterExit> {
    match tokio::time::timeout(WRITER_STOP_TIMEOUT, &mut handle).await {
        Ok(Ok(exit)) => Some(exit),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "result writer task failed");
            None
        }
        Err(_) => {
            tracing::warn!("result writer did not stop in time, aborting");
            handle.abort();
            None
        }
    }
}

/// Per-connection writer: moves frames from the outbox to the sink.
async fn write_frames(
    outbox: Outbox,
    mut sink: LineSink,
    abort: CancellationToken,
    finish: CancellationToken,
    failed: CancellationToken,
) -> WriterExit {
    loop {
        if abort.is_cancelled() {
            return WriterExit { sink, error: None };
        }
        let Some(frame) = outbox.front() else {
            if finish.is_cancelled() {
                return WriterExit { sink, error: None };
            }
            tokio::select! {
                biased;
                _ = abort.cancelled() => {}
                _ = finish.cancelled() => {}
                _ = outbox.changed() => {}
            }
            continue;
        };

        let line = match frame.encode() {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "dropping frame that cannot be encoded");
                outbox.confirm();
                continue;
            }
        };
        if let Err(err) = sink.send(line).await {
            failed.cancel();
            return WriterExit {
                sink,
                error: Some(err),
            };
        }
        outbox.confirm();
    }
}

/// Why an [`EventStream`] ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The engine closed the connection.
    Closed,
    /// Reading failed.
    Failed(TransportError),
    /// Writing failed.
    WriterFailed,
}

/// Inbound events of one connection. See [`StreamClient::receive`].
pub struct EventStream {
    reader: LineStream,
    outbox: Outbox,
    writer_failed: Pin<Box<WaitForCancellationFutureOwned>>,
    end: Option<StreamEnd>,
}

impl EventStream {
    /// Why the stream ended, once it has.
    pub fn end(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    fn handle(&self, line: &str) -> Option<InboundEvent> {
        match EngineFrame::decode(line) {
            Ok(EngineFrame::Event(event)) => {
                tracing::debug!(
                    event_id = %event.event_id,
                    entity_id = %event.entity_id,
                    handler = %event.handler_name,
                    "event received"
                );
                Some(event)
            }
            Ok(EngineFrame::KeepAlive { id }) => {
                self.outbox.push(ClientFrame::KeepAliveAck { id });
                None
            }
            Ok(EngineFrame::Greet { member_id }) => {
                tracing::info!(member_id = %member_id, "engine greeted");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping undecodable frame");
                None
            }
        }
    }
}

impl Stream for EventStream {
    type Item = InboundEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.end.is_some() {
            return Poll::Ready(None);
        }
        if this.writer_failed.as_mut().poll(cx).is_ready() {
            this.end = Some(StreamEnd::WriterFailed);
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.reader.as_mut().poll_next(cx)) {
                Some(Ok(line)) => {
                    if let Some(event) = this.handle(&line) {
                        return Poll::Ready(Some(event));
                    }
                }
                Some(Err(err)) => {
                    this.end = Some(StreamEnd::Failed(err));
                    return Poll::Ready(None);
                }
                None => {
                    this.end = Some(StreamEnd::Closed);
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").field("end", &self.end).finish()
    }
}
