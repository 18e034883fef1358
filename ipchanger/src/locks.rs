//! Per-adapter mutual exclusion
//!
//! Requests for the same adapter are applied one at a time; requests for
//! different adapters proceed in parallel. Entries are created on demand and
//! removed once nobody holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type Registry = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    // The map stays consistent even if a holder panicked
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct AdapterLocks {
    registry: Registry,
}

impl AdapterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `adapter_id`.
    ///
    /// The returned lease may be moved to another thread; dropping it releases
    /// the adapter.
    pub async fn acquire(&self, adapter_id: &str) -> AdapterLease {
        let lock = {
            let mut map = lock_registry(&self.registry);
            Arc::clone(map.entry(adapter_id.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;
        AdapterLease {
            guard: Some(guard),
            registry: Arc::clone(&self.registry),
            adapter_id: adapter_id.to_string(),
        }
    }

    /// Number of adapters currently held or awaited
    pub fn len(&self) -> usize {
        lock_registry(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one adapter
pub struct AdapterLease {
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
    adapter_id: String,
}

impl AdapterLease {
    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }
}

impl Drop for AdapterLease {
    fn drop(&mut self) {
        let mut map = lock_registry(&self.registry);
        drop(self.guard.take());

        // Only the registry itself still references the lock
        if map
            .get(&self.adapter_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.adapter_id);
        }
    }
}
