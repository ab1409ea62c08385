// ── Channel kinds and units ──
//
// A channel is one named measurement type (`Temperature`, `Rain`, ...).
// The station API reports channel names as free-form strings; this module
// normalizes them and maps each to its display unit.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

// ── ChannelKind ─────────────────────────────────────────────────────

/// Normalized measurement channel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ChannelKind {
    Temperature,
    Humidity,
    #[strum(serialize = "CO2")]
    Co2,
    Noise,
    Pressure,
    Rain,
    Wind,
}

impl ChannelKind {
    /// Channels every base station reports, in registration order.
    pub const BASE_STATION: [Self; 5] = [
        Self::Temperature,
        Self::Humidity,
        Self::Co2,
        Self::Noise,
        Self::Pressure,
    ];

    /// The `dashboard_data` field holding this channel's instant value.
    pub fn reading_key(self) -> &'static str {
        match self {
            Self::Wind => "WindStrength",
            other => other.into(),
        }
    }

    /// Lowercase channel name, used for keys, icons and unit lookup.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Co2 => "co2",
            Self::Noise => "noise",
            Self::Pressure => "pressure",
            Self::Rain => "rain",
            Self::Wind => "wind",
        }
    }
}

// ── Rain accumulators ───────────────────────────────────────────────

/// Which value of a channel an entity mirrors.
///
/// Rain modules expose one instant value and two rolling sums; every other
/// channel only has [`Accumulator::Instant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accumulator {
    Instant,
    LastHour,
    LastDay,
}

impl Accumulator {
    /// Rain entities in registration order.
    pub const RAIN: [Self; 3] = [Self::Instant, Self::LastHour, Self::LastDay];

    /// Key suffix distinguishing the rain sums (`rain1`, `rain24`).
    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::Instant => "",
            Self::LastHour => "1",
            Self::LastDay => "24",
        }
    }

    /// The `dashboard_data` field for a rain sum, or `None` for the
    /// instant value (read via [`ChannelKind::reading_key`]).
    pub fn rain_reading_key(self) -> Option<&'static str> {
        match self {
            Self::Instant => None,
            Self::LastHour => Some("sum_rain_1"),
            Self::LastDay => Some("sum_rain_24"),
        }
    }
}

// ── Units ───────────────────────────────────────────────────────────

/// Account-wide measurement system (`user.administrative.unit`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Decode the API's numeric flag. Unknown values fall back to metric.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Imperial,
            _ => Self::Metric,
        }
    }
}

/// Temperature scale shown on every temperature entity of one topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl From<UnitSystem> for TemperatureUnit {
    fn from(system: UnitSystem) -> Self {
        match system {
            UnitSystem::Metric => Self::Celsius,
            UnitSystem::Imperial => Self::Fahrenheit,
        }
    }
}

/// Display unit for a channel name.
///
/// Matching is case-insensitive. Unrecognized names are returned as given,
/// so an unknown channel still shows something meaningful.
pub fn unit_label(channel: &str, temperature: TemperatureUnit) -> String {
    let unit = match channel.to_ascii_lowercase().as_str() {
        "temperature" => temperature.label(),
        "humidity" => "%",
        "co2" => "ppm",
        "noise" => "db",
        "pressure" => "mbar",
        "rain" => "mm",
        "wind" | "windstrength" | "guststrength" => "km/h",
        "windangle" | "gustangle" => "°",
        _ => return channel.to_owned(),
    };
    unit.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_label_known_channels() {
        let c = TemperatureUnit::Celsius;
        assert_eq!(unit_label("temperature", c), "°C");
        assert_eq!(unit_label("humidity", c), "%");
        assert_eq!(unit_label("co2", c), "ppm");
        assert_eq!(unit_label("noise", c), "db");
        assert_eq!(unit_label("pressure", c), "mbar");
        assert_eq!(unit_label("rain", c), "mm");
        assert_eq!(unit_label("WindStrength", c), "km/h");
        assert_eq!(unit_label("GustAngle", c), "°");
    }

    #[test]
    fn unit_label_is_case_insensitive() {
        let f = TemperatureUnit::Fahrenheit;
        assert_eq!(unit_label("Temperature", f), "°F");
        assert_eq!(unit_label("TEMPERATURE", f), "°F");
        assert_eq!(unit_label("CO2", f), "ppm");
    }

    #[test]
    fn unit_label_passes_unknown_through() {
        let c = TemperatureUnit::Celsius;
        assert_eq!(unit_label("Lux", c), "Lux");
        assert_eq!(unit_label("", c), "");
    }

    #[test]
    fn channel_parse_accepts_api_spelling() {
        assert_eq!("CO2".parse::<ChannelKind>().ok(), Some(ChannelKind::Co2));
        assert_eq!("co2".parse::<ChannelKind>().ok(), Some(ChannelKind::Co2));
        assert_eq!("Rain".parse::<ChannelKind>().ok(), Some(ChannelKind::Rain));
        assert!("Lux".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn reading_keys_match_dashboard_fields() {
        assert_eq!(ChannelKind::Co2.reading_key(), "CO2");
        assert_eq!(ChannelKind::Temperature.reading_key(), "Temperature");
        assert_eq!(ChannelKind::Wind.reading_key(), "WindStrength");
    }

    #[test]
    fn unit_system_decoding() {
        assert_eq!(UnitSystem::from_code(0), UnitSystem::Metric);
        assert_eq!(UnitSystem::from_code(1), UnitSystem::Imperial);
        assert_eq!(UnitSystem::from_code(7), UnitSystem::Metric);
        assert_eq!(
            TemperatureUnit::from(UnitSystem::Imperial),
            TemperatureUnit::Fahrenheit
        );
    }
}
