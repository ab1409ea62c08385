// ── API-to-domain type conversions ──
//
// Bridges raw `atmolink_api` station types into the `Snapshot` model.
// Names fall back to identifiers, non-numeric dashboard fields are
// dropped, and epoch timestamps become `DateTime<Utc>`.

use chrono::{DateTime, Utc};

use atmolink_api::{DashboardData, StationDevice, StationModule, StationsResponse};

use crate::model::{Module, Readings, Snapshot, Station, UnitSystem};

// ── Helpers ────────────────────────────────────────────────────────

/// Convert an optional epoch-seconds timestamp to `DateTime<Utc>`.
fn epoch_to_datetime(epoch: Option<i64>) -> Option<DateTime<Utc>> {
    epoch.and_then(|ts| DateTime::from_timestamp(ts, 0))
}

fn readings(dashboard: Option<&DashboardData>) -> Readings {
    dashboard
        .map(|d| d.numbers().collect())
        .unwrap_or_default()
}

/// First non-blank candidate, else the fallback.
fn display_name(candidates: &[Option<&String>], fallback: &str) -> String {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_owned()
}

// ── Conversions ────────────────────────────────────────────────────

impl From<StationsResponse> for Snapshot {
    fn from(resp: StationsResponse) -> Self {
        Self {
            unit_system: UnitSystem::from_code(resp.body.user.administrative.unit),
            stations: resp.body.devices.into_iter().map(Station::from).collect(),
            server_time: epoch_to_datetime(resp.time_server),
        }
    }
}

impl From<StationDevice> for Station {
    fn from(d: StationDevice) -> Self {
        let name = display_name(&[d.module_name.as_ref(), d.station_name.as_ref()], &d.id);
        let dashboard = d.dashboard_data.as_ref();
        Self {
            indoor: readings(dashboard),
            measured_at: epoch_to_datetime(dashboard.and_then(|x| x.time_utc)),
            modules: d.modules.into_iter().map(Module::from).collect(),
            name,
            id: d.id,
        }
    }
}

impl From<StationModule> for Module {
    fn from(m: StationModule) -> Self {
        let name = display_name(&[m.module_name.as_ref()], &m.id);
        let dashboard = m.dashboard_data.as_ref();
        Self {
            readings: readings(dashboard),
            measured_at: epoch_to_datetime(dashboard.and_then(|x| x.time_utc)),
            // Modules only omit `reachable` when they are online.
            reachable: m.reachable.unwrap_or(true),
            battery_percent: m.battery_percent,
            channels: m.data_type,
            name,
            id: m.id,
        }
    }
}
