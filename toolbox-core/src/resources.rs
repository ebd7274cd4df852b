//! Resource Manager (C5): a single reader-writer lock guarding the live
//! `ResourceTuple`. Readers take the read lock and clone the `Arc`; the
//! mutator replaces the tuple wholesale. In-flight requests hold their own
//! `Arc` clone, so a reload never invalidates work already in progress —
//! stale sources are simply dropped once their last reference goes away,
//! never eagerly closed (spec §9, Open Question resolved).

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::ResourceTuple;

pub struct ResourceManager {
    tuple: RwLock<Arc<ResourceTuple>>,
}

impl ResourceManager {
    pub fn new(initial: ResourceTuple) -> Self {
        Self {
            tuple: RwLock::new(Arc::new(initial)),
        }
    }

    /// A snapshot of the tuple as of this call. Holding the returned `Arc`
    /// keeps every source and tool in it alive regardless of later reloads.
    pub async fn current(&self) -> Arc<ResourceTuple> {
        self.tuple.read().await.clone()
    }

    /// Atomically replaces the tuple. Called only by the Hot-Reload
    /// Coordinator (C10) after a fully successful materialization.
    pub async fn set_resources(&self, new_tuple: ResourceTuple) {
        let mut guard = self.tuple.write().await;
        *guard = Arc::new(new_tuple);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reload_does_not_affect_in_flight_snapshot() {
        let manager = ResourceManager::new(ResourceTuple::default());
        let snapshot_before = manager.current().await;

        manager.set_resources(ResourceTuple::default()).await;

        let snapshot_after = manager.current().await;
        assert!(!Arc::ptr_eq(&snapshot_before, &snapshot_after));
        // The old snapshot is still usable; dropping it here is what
        // finally releases its sources.
        drop(snapshot_before);
    }
}
