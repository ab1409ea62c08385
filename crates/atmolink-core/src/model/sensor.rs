// ── Virtual sensor identity and state ──
//
// `SensorKey` identifies one mirrored channel value by stable remote ids.
// `DeviceId` is the handle the device registry hands back on creation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Accumulator;

/// Device type every mirrored channel registers as.
pub const SENSOR_DEVICE_TYPE: &str = "sensorMultilevel";

// ── SensorKey ───────────────────────────────────────────────────────

/// Composite key `<channel><suffix>:<station_id>:<module_id>`.
///
/// Base-station channels use the station id as module id. Rain sums carry
/// suffix `1` or `24`. Positional indices never appear in a key, so
/// reordering stations between polls keeps every key stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorKey(String);

impl SensorKey {
    pub fn new(channel: &str, accumulator: Accumulator, station_id: &str, module_id: &str) -> Self {
        Self(format!(
            "{}{}:{station_id}:{module_id}",
            channel.to_ascii_lowercase(),
            accumulator.key_suffix()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Registry-safe device id: `<prefix>_<key>` with every character
    /// outside `[A-Za-z0-9_]` replaced by `_`.
    pub fn device_id(&self, prefix: &str) -> DeviceId {
        let sanitized: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        DeviceId::from(format!("{prefix}_{sanitized}"))
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── DeviceId ────────────────────────────────────────────────────────

/// Identifier of a virtual device in the host registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Registration and metrics ────────────────────────────────────────

/// Everything the registry needs to create one virtual sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceParams {
    pub device_id: DeviceId,
    pub device_type: String,
    pub title: String,
    pub probe_title: String,
    pub scale_title: String,
    pub icon: String,
}

/// A single metric write against an existing virtual sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    /// Current value. `None` when the module stopped reporting it.
    Level(Option<f64>),
    Icon(String),
    Timestamp(DateTime<Utc>),
}

/// A registered virtual sensor as the registry currently holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualSensor {
    pub id: DeviceId,
    pub device_type: String,
    pub title: String,
    pub probe_title: String,
    /// Unit label, e.g. `°C` or `mm`.
    pub unit: String,
    pub icon: Option<String>,
    pub level: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VirtualSensor {
    pub fn from_params(params: DeviceParams) -> Self {
        Self {
            id: params.device_id,
            device_type: params.device_type,
            title: params.title,
            probe_title: params.probe_title,
            unit: params.scale_title,
            icon: Some(params.icon),
            level: None,
            updated_at: None,
        }
    }

    /// Apply one metric write in place.
    pub fn apply(&mut self, update: MetricUpdate) {
        match update {
            MetricUpdate::Level(level) => self.level = level,
            MetricUpdate::Icon(icon) => self.icon = Some(icon),
            MetricUpdate::Timestamp(at) => self.updated_at = Some(at),
        }
    }
}
