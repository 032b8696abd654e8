//! RecordingProcessor: sleeps, then records when it ran.

use crate::error::HandlerError;
use crate::event::Entity;
use crate::handler::Processor;
use crate::id::EntityId;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One recorded execution.
#[derive(Debug, Clone)]
pub struct ExecutionSpan {
    /// Entity the execution ran for.
    pub entity_id: EntityId,
    /// When the handler body started.
    pub started: Instant,
    /// When the handler body finished.
    pub finished: Instant,
}

impl ExecutionSpan {
    /// True when the two spans share any instant.
    pub fn overlaps(&self, other: &ExecutionSpan) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

/// Sleeps for a fixed delay and records the start and end of each call.
/// Returns the entity unchanged. Use `.spans()` to inspect executions.
pub struct RecordingProcessor {
    delay: Duration,
    blocking: bool,
    spans: Mutex<Vec<ExecutionSpan>>,
}

impl RecordingProcessor {
    /// Create a processor that takes `delay` per call.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            blocking: false,
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Like [`new`](Self::new), but the delay blocks the worker thread and
    /// never yields, so the call cannot be aborted part way.
    pub fn blocking(delay: Duration) -> Self {
        Self {
            blocking: true,
            ..Self::new(delay)
        }
    }

    /// Return a snapshot of all completed executions in completion order.
    pub fn spans(&self) -> Vec<ExecutionSpan> {
        self.spans.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn process(
        &self,
        entity: Entity,
        _params: &serde_json::Value,
    ) -> Result<Entity, HandlerError> {
        let started = Instant::now();
        if self.blocking {
            std::thread::sleep(self.delay);
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.spans.lock().unwrap().push(ExecutionSpan {
            entity_id: entity.id.clone(),
            started,
            finished: Instant::now(),
        });
        Ok(entity)
    }
}
