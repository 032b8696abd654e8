//! Wire frames: newline-delimited JSON objects tagged by `"type"`.

use junction_types::{InboundEvent, OutboundResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A frame that could not be encoded or decoded.
#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct FrameError(#[from] serde_json::Error);

/// Frames the client writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every connection.
    Join(JoinFrame),
    /// The terminal result for one event.
    Result(OutboundResult),
    /// Answer to an engine keep-alive.
    KeepAliveAck {
        /// Echo of the keep-alive id.
        id: serde_json::Value,
    },
}

/// Identifies this runtime to the engine.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinFrame {
    /// Member id of this runtime instance.
    pub member_id: String,
    /// Bearer token.
    pub token: String,
    /// Routing tags the engine may use to pick members.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl std::fmt::Debug for JoinFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinFrame")
            .field("member_id", &self.member_id)
            .field("token", &"[REDACTED]")
            .field("tags", &self.tags)
            .finish()
    }
}

/// Frames the engine writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineFrame {
    /// Handshake answer.
    Greet {
        /// Member id the engine registered.
        member_id: String,
    },
    /// Work to dispatch.
    Event(InboundEvent),
    /// Liveness probe; answered with [`ClientFrame::KeepAliveAck`].
    KeepAlive {
        /// Opaque id to echo.
        id: serde_json::Value,
    },
}

impl ClientFrame {
    /// Encode as one line, without the trailing newline.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one line.
    pub fn decode(line: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(line)?)
    }
}

impl EngineFrame {
    /// Encode as one line, without the trailing newline.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one line.
    pub fn decode(line: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(line)?)
    }
}
