use junction_entity_memory::MemoryEntityStore;
use junction_types::{Entity, EntityId, EntityStore, StoreError, load_required};
use serde_json::json;
use std::sync::Arc;

fn order(id: &str, total: i64) -> Entity {
    Entity::new(id, "order", 1, json!({"total": total}))
}

// --- Basic CRUD ---

#[tokio::test]
async fn save_then_load() {
    let store = MemoryEntityStore::new();
    store.save(&order("o1", 10)).await.unwrap();

    let loaded = store.load(&"o1".into(), "order", 1).await.unwrap();
    assert_eq!(loaded, Some(order("o1", 10)));
}

#[tokio::test]
async fn load_missing_returns_none() {
    let store = MemoryEntityStore::new();
    let loaded = store.load(&"nope".into(), "order", 1).await.unwrap();
    assert_eq!(loaded, None);
}

#[tokio::test]
async fn save_overwrites() {
    let store = MemoryEntityStore::new();
    store.save(&order("o1", 10)).await.unwrap();
    store.save(&order("o1", 20)).await.unwrap();

    let loaded = store.load(&"o1".into(), "order", 1).await.unwrap().unwrap();
    assert_eq!(loaded.data["total"], 20);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn delete_removes_and_is_idempotent() {
    let store = MemoryEntityStore::new();
    store.save(&order("o1", 10)).await.unwrap();
    store.delete(&"o1".into(), "order", 1).await.unwrap();
    store.delete(&"o1".into(), "order", 1).await.unwrap();
    assert!(store.is_empty().await);
}

// --- Key isolation ---

#[tokio::test]
async fn model_and_version_isolate_entries() {
    let store = MemoryEntityStore::new();
    store.save(&order("x", 1)).await.unwrap();
    store
        .save(&Entity::new("x", "order", 2, json!({"total": 2})))
        .await
        .unwrap();
    store
        .save(&Entity::new("x", "invoice", 1, json!({"total": 3})))
        .await
        .unwrap();

    assert_eq!(store.len().await, 3);
    let v2 = store.load(&"x".into(), "order", 2).await.unwrap().unwrap();
    assert_eq!(v2.data["total"], 2);
}

#[tokio::test]
async fn ids_lists_one_model_version_sorted() {
    let store = MemoryEntityStore::new();
    for id in ["b", "a", "c"] {
        store.save(&order(id, 0)).await.unwrap();
    }
    store
        .save(&Entity::new("z", "invoice", 1, json!({})))
        .await
        .unwrap();

    let ids = store.ids("order", 1).await;
    assert_eq!(ids, vec![EntityId::new("a"), EntityId::new("b"), EntityId::new("c")]);
}

// --- Helpers ---

#[tokio::test]
async fn load_required_reports_missing_entity() {
    let store = MemoryEntityStore::new();
    let err = load_required(&store, &"o9".into(), "order", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(err.to_string(), "entity not found: order@1/o9");
}

#[tokio::test]
async fn concurrent_saves_all_land() {
    let store = Arc::new(MemoryEntityStore::new());
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.save(&order(&format!("o{i}"), i)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.ids("order", 1).await.len(), 20);
}

fn _assert_send_sync<T: Send + Sync>() {}

#[test]
fn store_is_object_safe() {
    _assert_send_sync::<MemoryEntityStore>();
    let _: Arc<dyn EntityStore> = Arc::new(MemoryEntityStore::new());
}
