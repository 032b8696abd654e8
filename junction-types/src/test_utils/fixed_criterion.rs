//! FixedCriterion: returns the same decision for every entity.

use crate::error::HandlerError;
use crate::event::Entity;
use crate::handler::Criterion;
use async_trait::async_trait;

/// A criterion that always answers with the configured decision.
pub struct FixedCriterion(pub bool);

#[async_trait]
impl Criterion for FixedCriterion {
    async fn check(
        &self,
        _entity: &Entity,
        _params: &serde_json::Value,
    ) -> Result<bool, HandlerError> {
        Ok(self.0)
    }
}
