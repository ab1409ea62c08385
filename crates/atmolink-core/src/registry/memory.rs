// ── In-process device registry ──
//
// Concurrent storage with O(1) lookups and push-based change notification
// via a `watch` snapshot channel. Used by the CLI and by tests.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use super::DeviceRegistry;
use crate::model::{DeviceId, DeviceParams, MetricUpdate, VirtualSensor};

/// Reactive in-memory registry.
///
/// Every mutation rebuilds the sorted snapshot that subscribers receive
/// and bumps a version counter.
pub struct MemoryRegistry {
    by_id: DashMap<DeviceId, Arc<VirtualSensor>>,
    version: watch::Sender<u64>,
    snapshot: watch::Sender<Arc<Vec<Arc<VirtualSensor>>>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    pub fn get(&self, id: &DeviceId) -> Option<Arc<VirtualSensor>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot, sorted by device id (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<VirtualSensor>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<VirtualSensor>>>> {
        self.snapshot.subscribe()
    }

    /// Number of mutations applied so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut values: Vec<Arc<VirtualSensor>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn create(&self, params: DeviceParams) -> DeviceId {
        let sensor = VirtualSensor::from_params(params);
        let id = sensor.id.clone();
        self.by_id.insert(id.clone(), Arc::new(sensor));
        self.publish();
        id
    }

    fn remove(&self, id: &DeviceId) -> bool {
        let removed = self.by_id.remove(id).is_some();
        if removed {
            self.publish();
        }
        removed
    }

    fn set(&self, id: &DeviceId, update: MetricUpdate) -> bool {
        let updated = match self.by_id.get_mut(id) {
            Some(mut entry) => {
                Arc::make_mut(entry.value_mut()).apply(update);
                true
            }
            None => false,
        };
        // The shard guard is released before the snapshot is rebuilt.
        if updated {
            self.publish();
        }
        updated
    }

    fn list(&self) -> Vec<Arc<VirtualSensor>> {
        self.snapshot().as_ref().clone()
    }
}
