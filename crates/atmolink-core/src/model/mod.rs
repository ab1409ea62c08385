// ── Domain model ──
//
// Canonical types shared by the reconciler, the bridge and consumers.

pub mod channel;
pub mod sensor;
pub mod snapshot;

pub use channel::{Accumulator, ChannelKind, TemperatureUnit, UnitSystem, unit_label};
pub use sensor::{
    DeviceId, DeviceParams, MetricUpdate, SENSOR_DEVICE_TYPE, SensorKey, VirtualSensor,
};
pub use snapshot::{Module, Readings, Snapshot, Station};
