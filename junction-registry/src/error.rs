//! Registry errors.

use junction_types::HandlerKind;
use thiserror::Error;

/// A handler module that could not be loaded. Logged and skipped; the
/// registry continues without it.
#[derive(Debug, Clone, Error)]
#[error("module '{module}' failed to load: {reason}")]
pub struct LoadError {
    /// Identifier of the module.
    pub module: String,
    /// What went wrong.
    pub reason: String,
}

impl LoadError {
    /// Create a load error for `module`.
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Errors building or querying a [`HandlerRegistry`](crate::HandlerRegistry).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two handlers of the same kind were registered under one name.
    /// Fatal at startup.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind both handlers share.
        kind: HandlerKind,
        /// The contested name.
        name: String,
    },

    /// Loading finished with no handlers at all. Fatal at startup.
    #[error("no handlers registered")]
    Empty,

    /// No handler of the requested kind has this name.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Requested kind.
        kind: HandlerKind,
        /// Requested name.
        name: String,
    },
}
