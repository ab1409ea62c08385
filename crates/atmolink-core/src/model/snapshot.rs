// ── Station snapshot domain types ──
//
// One processing pass worth of station data. Nothing here outlives a poll
// except the station count the reconciler keeps as its topology signature.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::UnitSystem;

/// Numeric readings of a station or module keyed by `dashboard_data` field
/// (`Temperature`, `CO2`, `sum_rain_24`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Readings(BTreeMap<String, f64>);

impl Readings {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: f64) {
        self.0.insert(field.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Readings {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub unit_system: UnitSystem,
    pub stations: Vec<Station>,
    /// Server clock at response time, when reported.
    pub server_time: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Topology signature.
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn module_count(&self) -> usize {
        self.stations.iter().map(|s| s.modules.len()).sum()
    }
}

/// A base station with its indoor readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub indoor: Readings,
    pub measured_at: Option<DateTime<Utc>>,
    pub modules: Vec<Module>,
}

/// An auxiliary module paired to a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    /// Channel names as reported (`data_type`), order preserved.
    pub channels: Vec<String>,
    pub readings: Readings,
    pub reachable: bool,
    pub battery_percent: Option<i64>,
    pub measured_at: Option<DateTime<Utc>>,
}
