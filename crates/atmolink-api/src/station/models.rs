// Station data response types
//
// Models for `GET /api/getstationsdata`. Fields use `#[serde(default)]`
// liberally because modules that are unreachable omit most of their data,
// and the dashboard shape varies by module type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Envelope ─────────────────────────────────────────────────────────

/// Top-level response:
/// ```json
/// { "body": { "devices": [...], "user": {...} }, "status": "ok", "time_server": 1700000000 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsResponse {
    pub body: StationsBody,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub time_server: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsBody {
    #[serde(default)]
    pub devices: Vec<StationDevice>,
    #[serde(default)]
    pub user: User,
}

// ── User ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub administrative: Administrative,
}

/// Account display preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Administrative {
    /// 0 = metric, 1 = imperial.
    #[serde(default)]
    pub unit: i64,
    /// 0 = kph, 1 = mph, 2 = m/s, 3 = beaufort, 4 = knot.
    #[serde(default)]
    pub windunit: Option<i64>,
    /// 0 = mbar, 1 = inHg, 2 = mmHg.
    #[serde(default)]
    pub pressureunit: Option<i64>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub reg_locale: Option<String>,
}

// ── Devices and modules ──────────────────────────────────────────────

/// A base station (`NAMain`) with its paired modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDevice {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub data_type: Vec<String>,
    #[serde(default)]
    pub reachable: Option<bool>,
    #[serde(default)]
    pub dashboard_data: Option<DashboardData>,
    #[serde(default)]
    pub modules: Vec<StationModule>,
}

/// An auxiliary module (`NAModule1`..`NAModule4`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationModule {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
    /// Channel names reported by this module, e.g. `["Temperature", "Humidity"]`
    /// or `["Rain"]`.
    #[serde(default)]
    pub data_type: Vec<String>,
    #[serde(default)]
    pub reachable: Option<bool>,
    #[serde(default)]
    pub battery_percent: Option<i64>,
    #[serde(default)]
    pub last_seen: Option<i64>,
    #[serde(default)]
    pub dashboard_data: Option<DashboardData>,
}

/// Latest measurements of a station or module.
///
/// Keys are channel names (`Temperature`, `Rain`, `sum_rain_24`, ...).
/// Most values are numeric; trends (`temp_trend`) are strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub time_utc: Option<i64>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl DashboardData {
    /// Numeric value of a field, if present and numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// All numeric fields by name.
    pub fn numbers(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.as_str(), n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_skips_non_numeric_fields() {
        let data: DashboardData = serde_json::from_value(json!({
            "time_utc": 1_700_000_000,
            "Temperature": 21.5,
            "CO2": 612,
            "temp_trend": "up"
        }))
        .expect("valid dashboard");

        assert_eq!(data.time_utc, Some(1_700_000_000));
        assert_eq!(data.number("Temperature"), Some(21.5));
        assert_eq!(data.number("CO2"), Some(612.0));
        assert_eq!(data.number("temp_trend"), None);
        assert_eq!(data.numbers().count(), 2);
    }

    #[test]
    fn unreachable_module_parses_without_dashboard() {
        let module: StationModule = serde_json::from_value(json!({
            "_id": "05:00:00:00:00:01",
            "type": "NAModule3",
            "module_name": "Rain gauge",
            "data_type": ["Rain"],
            "reachable": false
        }))
        .expect("valid module");

        assert!(module.dashboard_data.is_none());
        assert_eq!(module.data_type, vec!["Rain".to_string()]);
    }
}
