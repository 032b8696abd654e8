//! Builders for inbound events.

use crate::event::{HandlerKind, InboundEvent};
use crate::id::{EntityId, EventId};

/// An event asking the named processor to run on `entity_id`.
pub fn processor_event(
    event_id: &str,
    entity_id: &str,
    handler: &str,
    payload: serde_json::Value,
) -> InboundEvent {
    build(event_id, entity_id, HandlerKind::Processor, handler, payload)
}

/// An event asking the named criterion to evaluate `entity_id`.
pub fn criterion_event(
    event_id: &str,
    entity_id: &str,
    handler: &str,
    payload: serde_json::Value,
) -> InboundEvent {
    build(event_id, entity_id, HandlerKind::Criterion, handler, payload)
}

fn build(
    event_id: &str,
    entity_id: &str,
    kind: HandlerKind,
    handler: &str,
    payload: serde_json::Value,
) -> InboundEvent {
    InboundEvent {
        event_id: EventId::new(event_id),
        entity_id: EntityId::new(entity_id),
        entity_type: "test_entity".into(),
        model_version: 1,
        transition_name: "test_transition".into(),
        handler_kind: kind,
        handler_name: handler.into(),
        payload,
        parameters: serde_json::Value::Null,
    }
}
