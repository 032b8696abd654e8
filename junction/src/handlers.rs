//! Handler modules compiled into the daemon.
//!
//! | Module | Processors | Criteria |
//! |--------|------------|----------|
//! | `core` | `noop`, `stamp` | `always`, `field_equals` |
//! | `store` | `persist` | `exists` |

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use junction_registry::{HandlerModule, LoadError, ModuleCatalog, ModuleRegistrar};
use junction_types::{Criterion, Entity, EntityStore, HandlerError, Processor};
use serde_json::Value;
use std::sync::Arc;

/// Field `stamp` writes to when `parameters.field` is absent.
pub const DEFAULT_STAMP_FIELD: &str = "processed_at";

/// Every module the daemon ships, with `store` backed by `store`.
pub fn builtin_catalog(store: Arc<dyn EntityStore>) -> ModuleCatalog {
    ModuleCatalog::new()
        .with_module(CoreModule)
        .with_module(StoreModule::new(store))
}

/// Stateless handlers.
pub struct CoreModule;

impl HandlerModule for CoreModule {
    fn name(&self) -> &str {
        "core"
    }

    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), LoadError> {
        registrar.processor("noop", NoopProcessor);
        registrar.processor("stamp", StampProcessor);
        registrar.criterion("always", AlwaysCriterion);
        registrar.criterion("field_equals", FieldEqualsCriterion);
        Ok(())
    }
}

/// Handlers that read and write an [`EntityStore`].
pub struct StoreModule {
    store: Arc<dyn EntityStore>,
}

impl StoreModule {
    /// Create the module over `store`.
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

impl HandlerModule for StoreModule {
    fn name(&self) -> &str {
        "store"
    }

    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), LoadError> {
        registrar.processor("persist", PersistProcessor(Arc::clone(&self.store)));
        registrar.criterion("exists", ExistsCriterion(Arc::clone(&self.store)));
        Ok(())
    }
}

/// Returns the entity unchanged.
pub struct NoopProcessor;

#[async_trait]
impl Processor for NoopProcessor {
    async fn process(&self, entity: Entity, _params: &Value) -> Result<Entity, HandlerError> {
        Ok(entity)
    }
}

/// Writes the current UTC time, RFC 3339, into a field of the entity.
pub struct StampProcessor;

#[async_trait]
impl Processor for StampProcessor {
    async fn process(&self, mut entity: Entity, params: &Value) -> Result<Entity, HandlerError> {
        let field = optional_str(params, "field")?.unwrap_or(DEFAULT_STAMP_FIELD);
        let Some(body) = entity.data.as_object_mut() else {
            return Err(HandlerError::InvalidInput(
                "entity body is not an object".into(),
            ));
        };
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        body.insert(field.to_string(), Value::String(now));
        Ok(entity)
    }
}

/// Always passes.
pub struct AlwaysCriterion;

#[async_trait]
impl Criterion for AlwaysCriterion {
    async fn check(&self, _entity: &Entity, _params: &Value) -> Result<bool, HandlerError> {
        Ok(true)
    }
}

/// Passes when `parameters.field` of the entity body equals `parameters.value`.
pub struct FieldEqualsCriterion;

#[async_trait]
impl Criterion for FieldEqualsCriterion {
    async fn check(&self, entity: &Entity, params: &Value) -> Result<bool, HandlerError> {
        let field = optional_str(params, "field")?
            .ok_or_else(|| HandlerError::InvalidInput("missing parameter: field".into()))?;
        let expected = params
            .get("value")
            .ok_or_else(|| HandlerError::InvalidInput("missing parameter: value".into()))?;
        Ok(entity.data.get(field) == Some(expected))
    }
}

/// Saves the entity and returns it.
pub struct PersistProcessor(Arc<dyn EntityStore>);

#[async_trait]
impl Processor for PersistProcessor {
    async fn process(&self, entity: Entity, _params: &Value) -> Result<Entity, HandlerError> {
        self.0.save(&entity).await?;
        tracing::debug!(entity_id = %entity.id, model = %entity.entity_type, "entity persisted");
        Ok(entity)
    }
}

/// Passes when the store holds the entity's id under its model and version.
pub struct ExistsCriterion(Arc<dyn EntityStore>);

#[async_trait]
impl Criterion for ExistsCriterion {
    async fn check(&self, entity: &Entity, _params: &Value) -> Result<bool, HandlerError> {
        let found = self
            .0
            .load(&entity.id, &entity.entity_type, entity.model_version)
            .await?;
        Ok(found.is_some())
    }
}

fn optional_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, HandlerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(HandlerError::InvalidInput(format!(
            "parameter {key} must be a string"
        ))),
    }
}
