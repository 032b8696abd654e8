//! The two handler capabilities the engine can invoke.
//!
//! A processor transforms an entity during a transition; a criterion
//! decides whether a transition may proceed. Both fail by returning a
//! [`HandlerError`]. Implementations are registered explicitly by name;
//! nothing is discovered at runtime.

use crate::error::HandlerError;
use crate::event::Entity;
use async_trait::async_trait;

/// Transforms an entity as part of a workflow transition.
///
/// The returned entity's `data` becomes the result payload. Implementations
/// may mutate the entity they receive and hand it back.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Process one entity.
    async fn process(
        &self,
        entity: Entity,
        params: &serde_json::Value,
    ) -> Result<Entity, HandlerError>;
}

/// Evaluates a boolean gate controlling whether a transition may proceed.
#[async_trait]
pub trait Criterion: Send + Sync {
    /// Check one entity.
    async fn check(&self, entity: &Entity, params: &serde_json::Value)
    -> Result<bool, HandlerError>;
}
