//! Per-entity mutual exclusion.

use junction_types::EntityId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// One async mutex per entity id, created on first use.
///
/// An entry lives only while some dispatch holds or waits for it. The last
/// party to let go removes it, so the table stays proportional to the
/// number of entities with work in flight.
#[derive(Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<EntityId, Slot>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Waiters are served in FIFO order. Dropping the returned future while
    /// it waits gives up the place in line without leaking the entry.
    pub async fn acquire(self: &Arc<Self>, key: &EntityId) -> EntityGuard {
        let (slot, mutex) = self.checkout(key);
        let guard = mutex.lock_owned().await;
        EntityGuard { _guard: guard, _slot: slot }
    }

    /// Number of entities that currently have an entry.
    pub fn len(&self) -> usize {
        self.lock_table().len()
    }

    /// True when no entity holds or waits for a lock.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn checkout(self: &Arc<Self>, key: &EntityId) -> (SlotRef, Slot) {
        let mut table = self.lock_table();
        let mutex = Arc::clone(table.entry(key.clone()).or_default());
        let slot = SlotRef {
            locks: Arc::clone(self),
            key: key.clone(),
            mutex: Some(Arc::clone(&mutex)),
        };
        (slot, mutex)
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<EntityId, Slot>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for KeyedLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLocks").field("entries", &self.len()).finish()
    }
}

/// A reference to an entry, counted against its reclamation.
struct SlotRef {
    locks: Arc<KeyedLocks>,
    key: EntityId,
    mutex: Option<Slot>,
}

impl Drop for SlotRef {
    fn drop(&mut self) {
        let mut table = self.locks.lock_table();
        let Some(mutex) = self.mutex.take() else {
            return;
        };
        let ours = table
            .get(&self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &mutex));
        drop(mutex);
        // Lock futures and guards release their clone before their SlotRef,
        // so the last SlotRef out finds only the table's reference.
        if ours
            && table
                .get(&self.key)
                .is_some_and(|current| Arc::strong_count(current) == 1)
        {
            table.remove(&self.key);
        }
    }
}

/// Exclusive access to one entity. Released on drop.
///
/// Field order matters: the mutex guard is released before the entry is
/// considered for removal.
pub struct EntityGuard {
    _guard: OwnedMutexGuard<()>,
    _slot: SlotRef,
}

impl std::fmt::Debug for EntityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGuard")
            .field("entity_id", &self._slot.key)
            .finish()
    }
}
