//! Handler descriptors: what the registry stores per name.

use junction_types::{Criterion, HandlerKind, Processor};
use std::sync::Arc;
use std::time::Duration;

/// Type-erased reference to a registered handler.
#[derive(Clone)]
pub enum HandlerRef {
    /// A processor.
    Processor(Arc<dyn Processor>),
    /// A criterion.
    Criterion(Arc<dyn Criterion>),
}

impl HandlerRef {
    /// Which capability this handler provides.
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Processor(_) => HandlerKind::Processor,
            Self::Criterion(_) => HandlerKind::Criterion,
        }
    }
}

/// A named handler plus its optional per-call timeout.
///
/// Owned by the registry; the dispatcher only ever borrows or clones it.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    handler: HandlerRef,
    timeout: Option<Duration>,
}

impl HandlerDescriptor {
    /// Describe a processor.
    pub fn processor(name: impl Into<String>, processor: Arc<dyn Processor>) -> Self {
        Self {
            name: name.into(),
            handler: HandlerRef::Processor(processor),
            timeout: None,
        }
    }

    /// Describe a criterion.
    pub fn criterion(name: impl Into<String>, criterion: Arc<dyn Criterion>) -> Self {
        Self {
            name: name.into(),
            handler: HandlerRef::Criterion(criterion),
            timeout: None,
        }
    }

    /// Override the supervisor's default timeout for this handler.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Processor or criterion.
    pub fn kind(&self) -> HandlerKind {
        self.handler.kind()
    }

    /// The callable.
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Per-call timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("timeout", &self.timeout)
            .finish()
    }
}
