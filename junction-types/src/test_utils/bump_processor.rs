//! BumpProcessor: increments a numeric field of the entity.

use crate::error::HandlerError;
use crate::event::Entity;
use crate::handler::Processor;
use async_trait::async_trait;

/// Adds one to a numeric field. The field is `params.field`, or `value`
/// when no parameter is given.
pub struct BumpProcessor;

#[async_trait]
impl Processor for BumpProcessor {
    async fn process(
        &self,
        mut entity: Entity,
        params: &serde_json::Value,
    ) -> Result<Entity, HandlerError> {
        let field = params
            .get("field")
            .and_then(|f| f.as_str())
            .unwrap_or("value");
        let current = entity
            .data
            .get(field)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| HandlerError::InvalidInput(format!("field '{field}' is not an integer")))?;
        entity.data[field] = serde_json::json!(current + 1);
        Ok(entity)
    }
}
