#![deny(missing_docs)]
//! In-memory implementation of junction's EntityStore trait.
//!
//! Entities are keyed by model, model version, and id, so the same id under
//! two models or two versions are distinct entries.

use async_trait::async_trait;
use junction_types::{Entity, EntityId, EntityStore, StoreError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntityKey {
    model: String,
    version: u32,
    id: EntityId,
}

impl EntityKey {
    fn new(id: &EntityId, model: &str, version: u32) -> Self {
        Self {
            model: model.to_string(),
            version,
            id: id.clone(),
        }
    }
}

/// Entity store backed by a `HashMap` behind a `RwLock`.
///
/// For tests and single-process deployments; nothing survives a restart.
#[derive(Default)]
pub struct MemoryEntityStore {
    data: RwLock<HashMap<EntityKey, Entity>>,
}

impl MemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids stored under one model version, sorted.
    pub async fn ids(&self, model: &str, version: u32) -> Vec<EntityId> {
        let data = self.data.read().await;
        let mut ids: Vec<EntityId> = data
            .keys()
            .filter(|k| k.model == model && k.version == version)
            .map(|k| k.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Total number of stored entities.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// True if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn load(
        &self,
        id: &EntityId,
        model: &str,
        version: u32,
    ) -> Result<Option<Entity>, StoreError> {
        let data = self.data.read().await;
        Ok(data.get(&EntityKey::new(id, model, version)).cloned())
    }

    async fn save(&self, entity: &Entity) -> Result<(), StoreError> {
        let key = EntityKey::new(&entity.id, &entity.entity_type, entity.model_version);
        self.data.write().await.insert(key, entity.clone());
        Ok(())
    }

    async fn delete(&self, id: &EntityId, model: &str, version: u32) -> Result<(), StoreError> {
        self.data
            .write()
            .await
            .remove(&EntityKey::new(id, model, version));
        Ok(())
    }
}
