//! Stream and transport errors.

use crate::session::SessionState;
use junction_auth::AuthError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Failures of the byte channel to the engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Read or write failed on an open connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine sent a line longer than the configured maximum.
    #[error("frame exceeds {max} bytes")]
    FrameTooLong {
        /// Configured maximum.
        max: usize,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    pub(crate) fn from_codec(err: LinesCodecError, max: usize) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Self::FrameTooLong { max },
            LinesCodecError::Io(err) => Self::Io(err),
        }
    }
}

/// Errors from the stream client.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No token could be obtained.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A frame could not be encoded.
    #[error(transparent)]
    Frame(#[from] crate::frame::FrameError),

    /// The session was asked to move along a transition it does not have.
    #[error("illegal session transition: {from} -> {to}")]
    IllegalTransition {
        /// State before the request.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// Every connection attempt failed.
    #[error("gave up after {attempts} connection attempts: {last_error}")]
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },

    /// An operation needed an open connection.
    #[error("not connected")]
    NotConnected,
}
