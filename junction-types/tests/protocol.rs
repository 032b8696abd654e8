//! Acceptance tests for the protocol crate.
//!
//! Tests cover:
//! - Trait object safety (Arc<dyn Trait> is Send + Sync)
//! - Typed ID conversions
//! - Wire shape of events and results
//! - The bundled test handlers

use junction_types::test_utils::{
    BumpProcessor, FailingProcessor, FixedCriterion, RecordingProcessor, processor_event,
};
use junction_types::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Object Safety
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn _assert_send_sync<T: Send + Sync>() {}

#[test]
fn processor_is_object_safe_send_sync() {
    _assert_send_sync::<Arc<dyn Processor>>();
}

#[test]
fn criterion_is_object_safe_send_sync() {
    _assert_send_sync::<Arc<dyn Criterion>>();
}

#[test]
fn entity_store_is_object_safe_send_sync() {
    _assert_send_sync::<Arc<dyn EntityStore>>();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed IDs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn typed_ids_convert_and_display() {
    let from_str: EntityId = "e1".into();
    let from_string: EntityId = String::from("e1").into();
    assert_eq!(from_str, from_string);
    assert_eq!(from_str.to_string(), "e1");
    assert_eq!(EventId::new("42").as_str(), "42");
}

#[test]
fn typed_ids_serialize_as_plain_strings() {
    let json = serde_json::to_string(&EventId::new("abc")).unwrap();
    assert_eq!(json, "\"abc\"");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn handler_kind_uses_engine_spelling() {
    assert_eq!(
        serde_json::to_value(HandlerKind::Processor).unwrap(),
        json!("PROCESSOR")
    );
    assert_eq!(
        serde_json::to_value(HandlerKind::Criterion).unwrap(),
        json!("CRITERION")
    );
}

#[test]
fn error_codes_match_their_wire_spelling() {
    for code in [
        ErrorCode::LoadError,
        ErrorCode::DuplicateNameError,
        ErrorCode::NotFoundError,
        ErrorCode::TransportError,
        ErrorCode::HandlerExecutionError,
        ErrorCode::TimeoutError,
        ErrorCode::ShutdownError,
    ] {
        assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
    }
}

#[test]
fn criterion_result_carries_decision_only() {
    let event = processor_event("9", "e9", "gate", json!({}));
    let result = OutboundResult::decided(&event, false);
    let wire = serde_json::to_value(&result).unwrap();
    assert_eq!(wire["decision"], json!(false));
    assert!(wire.get("payload").is_none());
    assert!(wire.get("error_code").is_none());
}

#[test]
fn handler_error_display() {
    assert_eq!(
        HandlerError::InvalidInput("bad".into()).to_string(),
        "invalid input: bad"
    );
    let store = StoreError::NotFound {
        id: "e1".into(),
        model: "order".into(),
        version: 3,
    };
    assert_eq!(store.to_string(), "entity not found: order@3/e1");
    assert_eq!(
        HandlerError::from(store).to_string(),
        "store error: entity not found: order@3/e1"
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Test handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn bump_increments_value() {
    let event = processor_event("1", "e1", "bump", json!({"value": 5}));
    let out = BumpProcessor
        .process(event.entity(), &serde_json::Value::Null)
        .await
        .unwrap();
    assert_eq!(out.data, json!({"value": 6}));
}

#[tokio::test]
async fn bump_honours_field_parameter() {
    let event = processor_event("1", "e1", "bump", json!({"count": 1, "value": 0}));
    let out = BumpProcessor
        .process(event.entity(), &json!({"field": "count"}))
        .await
        .unwrap();
    assert_eq!(out.data, json!({"count": 2, "value": 0}));
}

#[tokio::test]
async fn bump_rejects_non_numeric_field() {
    let event = processor_event("1", "e1", "bump", json!({"value": "five"}));
    let err = BumpProcessor
        .process(event.entity(), &serde_json::Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::InvalidInput(_)));
}

#[tokio::test]
async fn failing_processor_fails() {
    let event = processor_event("1", "e1", "fail", json!({}));
    let err = FailingProcessor::new("nope")
        .process(event.entity(), &serde_json::Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "execution failed: nope");
}

#[tokio::test]
async fn fixed_criterion_answers() {
    let entity = Entity::new("e1", "order", 1, json!({}));
    assert!(FixedCriterion(true).check(&entity, &json!({})).await.unwrap());
    assert!(!FixedCriterion(false).check(&entity, &json!({})).await.unwrap());
}

#[tokio::test]
async fn recording_processor_records_spans() {
    let processor = RecordingProcessor::new(Duration::from_millis(10));
    let entity = Entity::new("e1", "order", 1, json!({}));
    processor
        .process(entity, &serde_json::Value::Null)
        .await
        .unwrap();
    let spans = processor.spans();
    assert_eq!(spans.len(), 1);
    assert!(spans[0].finished.duration_since(spans[0].started) >= Duration::from_millis(10));
    assert!(spans[0].overlaps(&spans[0]));
}
