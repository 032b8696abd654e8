//! Bounded, contained execution of a single handler call.

use crate::inflight::CancelHandle;
use junction_registry::{HandlerDescriptor, HandlerRef};
use junction_types::{Entity, ErrorCode, HandlerError, InboundEvent, OutboundResult};
use std::any::Any;
use std::time::Duration;
use tokio::task::JoinError;

/// Default deadline for a handler call.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs handlers with a deadline, isolating their failures.
///
/// Every call produces an [`OutboundResult`]: a handler error, a panic, a
/// missed deadline, or a cancellation each become an `ERROR` result with
/// the matching [`ErrorCode`]. Nothing a handler does escapes as a panic
/// or error into the caller.
#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    default_timeout: Duration,
}

enum Outcome {
    Processed(Entity),
    Decided(bool),
}

enum Failure {
    Handler(HandlerError),
    Panicked(String),
    TimedOut(Duration),
    Cancelled(crate::CancelReason),
}

impl ExecutionSupervisor {
    /// Create a supervisor applying `default_timeout` to handlers that
    /// declare none.
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// The deadline applied to `descriptor`.
    pub fn timeout_for(&self, descriptor: &HandlerDescriptor) -> Duration {
        descriptor.timeout().unwrap_or(self.default_timeout)
    }

    /// Invoke the handler behind `descriptor` for `event`.
    ///
    /// The handler runs on its own task so a panic is contained. The task
    /// is aborted when the deadline passes or `cancel` fires, and this call
    /// returns only after the task has stopped.
    pub async fn execute(
        &self,
        descriptor: &HandlerDescriptor,
        event: &InboundEvent,
        cancel: &CancelHandle,
    ) -> OutboundResult {
        let deadline = self.timeout_for(descriptor);
        let mut task = tokio::spawn(invoke(
            descriptor.handler().clone(),
            event.entity(),
            event.parameters.clone(),
        ));

        let outcome = tokio::select! {
            joined = tokio::time::timeout(deadline, &mut task) => match joined {
                Ok(Ok(Ok(outcome))) => Ok(outcome),
                Ok(Ok(Err(err))) => Err(Failure::Handler(err)),
                Ok(Err(join_err)) => Err(Failure::Panicked(panic_message(join_err))),
                Err(_elapsed) => Err(Failure::TimedOut(deadline)),
            },
            reason = cancel.cancelled() => Err(Failure::Cancelled(reason)),
        };
        if outcome.is_err() && !task.is_finished() {
            task.abort();
            // Abort lands at the handler's next await; hold the caller until then.
            let _ = (&mut task).await;
        }

        report(descriptor, event, outcome)
    }
}

impl Default for ExecutionSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLER_TIMEOUT)
    }
}

async fn invoke(
    handler: HandlerRef,
    entity: Entity,
    params: serde_json::Value,
) -> Result<Outcome, HandlerError> {
    match handler {
        HandlerRef::Processor(processor) => processor
            .process(entity, &params)
            .await
            .map(Outcome::Processed),
        HandlerRef::Criterion(criterion) => criterion
            .check(&entity, &params)
            .await
            .map(Outcome::Decided),
    }
}

fn report(
    descriptor: &HandlerDescriptor,
    event: &InboundEvent,
    outcome: Result<Outcome, Failure>,
) -> OutboundResult {
    let (code, message) = match outcome {
        Ok(Outcome::Processed(entity)) => return OutboundResult::processed(event, entity.data),
        Ok(Outcome::Decided(decision)) => return OutboundResult::decided(event, decision),
        Err(Failure::Handler(err)) => (ErrorCode::HandlerExecutionError, err.to_string()),
        Err(Failure::Panicked(msg)) => (
            ErrorCode::HandlerExecutionError,
            format!("handler panicked: {msg}"),
        ),
        Err(Failure::TimedOut(deadline)) => (
            ErrorCode::TimeoutError,
            format!("handler exceeded its {}ms deadline", deadline.as_millis()),
        ),
        Err(Failure::Cancelled(reason)) => (reason.error_code(), reason.message().to_string()),
    };

    tracing::warn!(
        handler = descriptor.name(),
        kind = %descriptor.kind(),
        event_id = %event.event_id,
        entity_id = %event.entity_id,
        error_code = %code,
        error = %message,
        "handler did not complete"
    );
    OutboundResult::error(event, code, message)
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => describe_panic(payload),
        Err(err) => err.to_string(),
    }
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancelReason;
    use junction_types::test_utils::{
        BumpProcessor, FailingProcessor, FixedCriterion, PanickingProcessor, RecordingProcessor,
        criterion_event, processor_event,
    };
    use junction_types::{Processor, ResultStatus};
    use serde_json::json;
    use std::sync::Arc;

    fn processor(name: &str, p: impl Processor + 'static) -> HandlerDescriptor {
        HandlerDescriptor::processor(name, Arc::new(p))
    }

    #[tokio::test]
    async fn processor_success_carries_payload() {
        let supervisor = ExecutionSupervisor::default();
        let event = processor_event("1", "e1", "bump", json!({"value": 1}));
        let result = supervisor
            .execute(&processor("bump", BumpProcessor), &event, &CancelHandle::new())
            .await;
        assert_eq!(result.status, ResultStatus::Ok);
        assert_eq!(result.payload, Some(json!({"value": 2})));
    }

    #[tokio::test]
    async fn criterion_success_carries_decision() {
        let supervisor = ExecutionSupervisor::default();
        let descriptor = HandlerDescriptor::criterion("gate", Arc::new(FixedCriterion(true)));
        let event = criterion_event("1", "e1", "gate", json!({}));
        let result = supervisor
            .execute(&descriptor, &event, &CancelHandle::new())
            .await;
        assert_eq!(result.decision, Some(true));
    }

    #[tokio::test]
    async fn handler_error_is_reported() {
        let supervisor = ExecutionSupervisor::default();
        let event = processor_event("1", "e1", "fail", json!({}));
        let result = supervisor
            .execute(
                &processor("fail", FailingProcessor::new("boom")),
                &event,
                &CancelHandle::new(),
            )
            .await;
        assert_eq!(result.error_code, Some(ErrorCode::HandlerExecutionError));
        assert_eq!(result.error_message.as_deref(), Some("execution failed: boom"));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let supervisor = ExecutionSupervisor::default();
        let event = processor_event("1", "e1", "panic", json!({}));
        let result = supervisor
            .execute(&processor("panic", PanickingProcessor), &event, &CancelHandle::new())
            .await;
        assert_eq!(result.error_code, Some(ErrorCode::HandlerExecutionError));
        assert!(result.error_message.unwrap().contains("handler bug"));
    }

    #[tokio::test]
    async fn descriptor_timeout_overrides_default() {
        let supervisor = ExecutionSupervisor::new(Duration::from_secs(60));
        let descriptor = processor("slow", RecordingProcessor::new(Duration::from_secs(5)))
            .with_timeout(Duration::from_millis(20));
        let event = processor_event("1", "e1", "slow", json!({}));
        let result = supervisor
            .execute(&descriptor, &event, &CancelHandle::new())
            .await;
        assert_eq!(result.error_code, Some(ErrorCode::TimeoutError));
        assert_eq!(supervisor.timeout_for(&descriptor), Duration::from_millis(20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timeout_waits_for_a_handler_that_never_yields() {
        let supervisor = ExecutionSupervisor::default();
        let recorder = Arc::new(RecordingProcessor::blocking(Duration::from_millis(150)));
        let descriptor = HandlerDescriptor::processor(
            "blocking",
            Arc::clone(&recorder) as Arc<dyn Processor>,
        )
        .with_timeout(Duration::from_millis(20));
        let event = processor_event("1", "e1", "blocking", json!({}));
        let result = supervisor
            .execute(&descriptor, &event, &CancelHandle::new())
            .await;
        assert_eq!(result.error_code, Some(ErrorCode::TimeoutError));
        // The handler body ran to completion before execute returned.
        assert_eq!(recorder.spans().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_reports_reason() {
        let supervisor = ExecutionSupervisor::default();
        let descriptor = processor("slow", RecordingProcessor::new(Duration::from_secs(5)));
        let event = processor_event("1", "e1", "slow", json!({}));
        let cancel = CancelHandle::new();
        cancel.cancel(CancelReason::Transport);
        let result = supervisor.execute(&descriptor, &event, &cancel).await;
        assert_eq!(result.error_code, Some(ErrorCode::TransportError));
    }
}
