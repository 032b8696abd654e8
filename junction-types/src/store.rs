//! Entity storage collaborator used by handler bodies.

use crate::error::StoreError;
use crate::event::Entity;
use crate::id::EntityId;
use async_trait::async_trait;

/// Load and save entities by id, model, and version.
///
/// The dispatch core never touches this trait. Handlers that need to read
/// related entities or persist side results hold an `Arc<dyn EntityStore>`.
///
/// Implementations:
/// - MemoryEntityStore: HashMap (testing, single process)
/// - a client for the platform's entity service
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load an entity. Returns None if it doesn't exist.
    async fn load(
        &self,
        id: &EntityId,
        model: &str,
        version: u32,
    ) -> Result<Option<Entity>, StoreError>;

    /// Save an entity. Creates or overwrites.
    async fn save(&self, entity: &Entity) -> Result<(), StoreError>;

    /// Delete an entity. No-op if it doesn't exist.
    async fn delete(&self, id: &EntityId, model: &str, version: u32) -> Result<(), StoreError>;
}

/// Load an entity or fail with [`StoreError::NotFound`].
pub async fn load_required(
    store: &dyn EntityStore,
    id: &EntityId,
    model: &str,
    version: u32,
) -> Result<Entity, StoreError> {
    store
        .load(id, model, version)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
            model: model.to_string(),
            version,
        })
}
