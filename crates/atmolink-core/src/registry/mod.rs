// ── Device registry seam ──
//
// The host home-automation controller owns the actual device list. The
// reconciler only ever creates, removes and writes metrics through this
// trait, so any host can plug in behind it.

mod memory;

use std::sync::Arc;

pub use memory::MemoryRegistry;

use crate::model::{DeviceId, DeviceParams, MetricUpdate, VirtualSensor};

/// Host device registry.
///
/// Implementations must be cheap to call from async code; none of these
/// methods may block on I/O.
pub trait DeviceRegistry: Send + Sync {
    /// Register a virtual sensor. Re-creating an existing id replaces it.
    fn create(&self, params: DeviceParams) -> DeviceId;

    /// Deregister a virtual sensor. Returns `false` if it was unknown.
    fn remove(&self, id: &DeviceId) -> bool;

    /// Write one metric. Returns `false` if the device is unknown.
    fn set(&self, id: &DeviceId, update: MetricUpdate) -> bool;

    /// Every registered sensor.
    fn list(&self) -> Vec<Arc<VirtualSensor>>;
}
