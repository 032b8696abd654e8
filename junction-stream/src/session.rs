//! Connection lifecycle state machine.

use crate::error::StreamError;
use tokio::sync::watch;

/// Lifecycle state of the engine connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection. Initial, and terminal after drain or give-up.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Events are flowing.
    Connected,
    /// The connection failed; retrying with backoff.
    Reconnecting,
    /// Intake stopped; finishing in-flight work before closing.
    Draining,
}

impl SessionState {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Draining => "draining",
        }
    }

    /// True if the state machine has an edge from `self` to `to`.
    pub fn can_transition_to(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
                | (Connected, Draining)
                | (Reconnecting, Draining)
                | (Draining, Disconnected)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single live session of a stream client.
///
/// Entering `Disconnected` from `Reconnecting` (gave up) or `Draining`
/// (shut down) is final, as is [`give_up`](Self::give_up): the session
/// refuses to connect again.
#[derive(Debug)]
pub struct StreamSession {
    state: watch::Sender<SessionState>,
    terminated: bool,
}

impl StreamSession {
    /// A fresh session in `Disconnected`.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            state,
            terminated: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// True once the session reached its terminal state.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Move to `to`, or fail with [`StreamError::IllegalTransition`].
    pub fn transition(&mut self, to: SessionState) -> Result<(), StreamError> {
        let from = self.state();
        if self.terminated || !from.can_transition_to(to) {
            return Err(StreamError::IllegalTransition { from, to });
        }
        if to == SessionState::Disconnected
            && matches!(from, SessionState::Reconnecting | SessionState::Draining)
        {
            self.terminated = true;
        }
        self.state.send_replace(to);
        tracing::debug!(from = %from, state = %to, "session state changed");
        Ok(())
    }

    /// Stop retrying: end in a terminal `Disconnected` from `Reconnecting`
    /// or from a failed first connection.
    pub fn give_up(&mut self) -> Result<(), StreamError> {
        match self.state() {
            SessionState::Disconnected if !self.terminated => {
                self.terminated = true;
                tracing::debug!(state = %SessionState::Disconnected, "session terminated");
                Ok(())
            }
            _ => self.transition(SessionState::Disconnected),
        }
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}
