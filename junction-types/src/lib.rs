//! # junction-types: protocol vocabulary for the junction dispatch runtime
//!
//! The external workflow engine pushes transition events; local handlers
//! answer them. This crate holds everything both sides of that exchange
//! agree on, and nothing about how it is carried out.
//!
//! | Concept | Types |
//! |---------|-------|
//! | Identity | [`EventId`], [`EntityId`] |
//! | Wire messages | [`InboundEvent`], [`OutboundResult`], [`ResultStatus`] |
//! | Handlers | [`Processor`], [`Criterion`], [`HandlerKind`], [`Entity`] |
//! | Failures | [`HandlerError`], [`StoreError`], [`ErrorCode`] |
//! | Collaborators | [`EntityStore`] |
//!
//! ## Dependency Notes
//!
//! Entity bodies and handler parameters are `serde_json::Value`. The engine
//! speaks JSON and entity schemas belong to the platform, so the runtime
//! passes them through untyped.

#![deny(missing_docs)]

pub mod error;
pub mod event;
pub mod handler;
pub mod id;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::{ErrorCode, HandlerError, StoreError};
pub use event::{Entity, HandlerKind, InboundEvent, OutboundResult, ResultStatus};
pub use handler::{Criterion, Processor};
pub use id::{EntityId, EventId};
pub use store::{EntityStore, load_required};
