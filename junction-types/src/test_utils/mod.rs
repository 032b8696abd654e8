//! Ready-made handlers and event builders for testing.
//!
//! Available behind the `test-utils` feature flag. The handlers cover the
//! shapes dispatch tests need: a working processor, a slow one that records
//! when it ran, failing and panicking ones, and a fixed-answer criterion.

mod bump_processor;
mod events;
mod failing;
mod fixed_criterion;
mod recording_processor;

pub use bump_processor::BumpProcessor;
pub use events::{criterion_event, processor_event};
pub use failing::{FailingProcessor, PanickingProcessor};
pub use fixed_criterion::FixedCriterion;
pub use recording_processor::{ExecutionSpan, RecordingProcessor};
