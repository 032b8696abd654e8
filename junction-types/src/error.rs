//! Error types shared by handlers and their collaborators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a handler body raises.
///
/// Whatever a handler returns here is contained by the supervisor and
/// reported to the engine as a `HANDLER_EXECUTION_ERROR` result.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The entity or parameters did not have the expected shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The handler ran but could not complete its work.
    #[error("execution failed: {0}")]
    Failed(String),

    /// A collaborator (entity store, remote service) failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Entity store errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the given id, model, and version.
    #[error("entity not found: {model}@{version}/{id}")]
    NotFound {
        /// Entity id that was looked up.
        id: String,
        /// Model name.
        model: String,
        /// Model version.
        version: u32,
    },

    /// A write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Error taxonomy reported to the engine in `error_code`.
///
/// Every per-event failure maps to exactly one code. The startup-only
/// codes (`LoadError`, `DuplicateNameError`) never appear on the wire but
/// share the taxonomy so logs use the same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A handler module failed to register.
    LoadError,
    /// Two handlers of one kind share a name.
    DuplicateNameError,
    /// No handler registered under the requested kind and name.
    NotFoundError,
    /// The stream to the engine failed while the work was in flight.
    TransportError,
    /// The handler returned an error or panicked.
    HandlerExecutionError,
    /// The handler exceeded its deadline.
    TimeoutError,
    /// The work was cancelled because the drain timeout elapsed.
    ShutdownError,
}

impl ErrorCode {
    /// The wire spelling of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadError => "LOAD_ERROR",
            Self::DuplicateNameError => "DUPLICATE_NAME_ERROR",
            Self::NotFoundError => "NOT_FOUND_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::HandlerExecutionError => "HANDLER_EXECUTION_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ShutdownError => "SHUTDOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
