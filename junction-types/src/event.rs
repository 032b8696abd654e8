//! Inbound transition events, outbound results, and the entity they carry.

use crate::error::ErrorCode;
use crate::id::{EntityId, EventId};
use serde::{Deserialize, Serialize};

/// Which handler capability an event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerKind {
    /// Transforms the entity.
    Processor,
    /// Evaluates a boolean gate on the entity.
    Criterion,
}

impl HandlerKind {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processor => "processor",
            Self::Criterion => "criterion",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned business object as seen by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    pub id: EntityId,
    /// Model name the entity belongs to.
    pub entity_type: String,
    /// Version of the model.
    pub model_version: u32,
    /// The entity body.
    pub data: serde_json::Value,
}

impl Entity {
    /// Create an entity.
    pub fn new(
        id: impl Into<EntityId>,
        entity_type: impl Into<String>,
        model_version: u32,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            model_version,
            data,
        }
    }
}

/// A unit of work pushed by the engine.
///
/// Immutable once received. The dispatcher owns it until the matching
/// [`OutboundResult`] is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Engine-assigned id, echoed on the result.
    pub event_id: EventId,
    /// Entity the transition applies to.
    pub entity_id: EntityId,
    /// Model name of the entity.
    pub entity_type: String,
    /// Model version of the entity.
    pub model_version: u32,
    /// Workflow transition that triggered the event.
    pub transition_name: String,
    /// Processor or criterion.
    pub handler_kind: HandlerKind,
    /// Registered name of the handler to run.
    pub handler_name: String,
    /// Entity body.
    pub payload: serde_json::Value,
    /// Handler parameters configured on the transition.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl InboundEvent {
    /// Build the entity a handler receives.
    pub fn entity(&self) -> Entity {
        Entity {
            id: self.entity_id.clone(),
            entity_type: self.entity_type.clone(),
            model_version: self.model_version,
            data: self.payload.clone(),
        }
    }
}

/// Terminal status of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// The handler completed.
    Ok,
    /// The handler failed, timed out, or was cancelled.
    Error,
    /// No handler is registered under the requested name.
    NotFound,
}

/// The single terminal response to an [`InboundEvent`].
///
/// Exactly one of these is sent per event. Processors fill `payload`,
/// criteria fill `decision`, failures fill `error_code` and `error_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundResult {
    /// Id of the originating event.
    pub event_id: EventId,
    /// Entity the event concerned.
    pub entity_id: EntityId,
    /// Terminal status.
    pub status: ResultStatus,
    /// Transformed entity body (processor success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Gate decision (criterion success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<bool>,
    /// Taxonomy code for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Human-readable failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl OutboundResult {
    fn bare(event: &InboundEvent, status: ResultStatus) -> Self {
        Self {
            event_id: event.event_id.clone(),
            entity_id: event.entity_id.clone(),
            status,
            payload: None,
            decision: None,
            error_code: None,
            error_message: None,
        }
    }

    /// Successful processor result carrying the transformed body.
    pub fn processed(event: &InboundEvent, payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::bare(event, ResultStatus::Ok)
        }
    }

    /// Successful criterion result carrying the decision.
    pub fn decided(event: &InboundEvent, decision: bool) -> Self {
        Self {
            decision: Some(decision),
            ..Self::bare(event, ResultStatus::Ok)
        }
    }

    /// Failed result.
    pub fn error(event: &InboundEvent, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            error_message: Some(message.into()),
            ..Self::bare(event, ResultStatus::Error)
        }
    }

    /// No handler registered under the requested kind and name.
    pub fn not_found(event: &InboundEvent) -> Self {
        Self {
            error_code: Some(ErrorCode::NotFoundError),
            error_message: Some(format!(
                "no {} registered as '{}'",
                event.handler_kind, event.handler_name
            )),
            ..Self::bare(event, ResultStatus::NotFound)
        }
    }

    /// True when the handler completed.
    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}
