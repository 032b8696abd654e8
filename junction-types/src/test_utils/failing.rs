//! Processors that fail on purpose.

use crate::error::HandlerError;
use crate::event::Entity;
use crate::handler::Processor;
use async_trait::async_trait;

/// Always returns [`HandlerError::Failed`] with the configured message.
pub struct FailingProcessor {
    message: String,
}

impl FailingProcessor {
    /// Create a processor that fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Processor for FailingProcessor {
    async fn process(
        &self,
        _entity: Entity,
        _params: &serde_json::Value,
    ) -> Result<Entity, HandlerError> {
        Err(HandlerError::Failed(self.message.clone()))
    }
}

/// Panics instead of returning. Exercises fault containment.
pub struct PanickingProcessor;

#[async_trait]
impl Processor for PanickingProcessor {
    async fn process(
        &self,
        _entity: Entity,
        _params: &serde_json::Value,
    ) -> Result<Entity, HandlerError> {
        panic!("handler bug")
    }
}
