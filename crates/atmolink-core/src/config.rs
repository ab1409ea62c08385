// ── Runtime bridge configuration ──
//
// These types describe *how* to talk to the station API and how mirrored
// sensors are presented. They carry credential data and tuning but never
// touch disk. The binary builds a `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use atmolink_api::{Credentials, Endpoints, TlsMode, TransportConfig};

/// Default poll cadence in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 10;

/// Default reserve kept before token expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Default icon location; `<channel>.png` is appended.
pub const DEFAULT_ICON_BASE: &str = "/modulemedia/atmolink";

/// Default device id prefix.
pub const DEFAULT_DEVICE_PREFIX: &str = "atmolink";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
}

// ── Labels ──────────────────────────────────────────────────────────

/// Display strings for titles and notifications.
///
/// Missing entries fall back to English, so a partial `[labels]` table
/// in the config file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub temperature: String,
    pub humidity: String,
    pub co2: String,
    pub noise: String,
    pub pressure: String,
    pub rain: String,
    pub wind: String,
    pub current: String,
    pub last1: String,
    pub last24: String,
    pub err_fetch_token: String,
    pub err_fetch_refreshtoken: String,
    pub err_fetch_data: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            temperature: "Temperature".into(),
            humidity: "Humidity".into(),
            co2: "CO2".into(),
            noise: "Noise".into(),
            pressure: "Pressure".into(),
            rain: "Rain".into(),
            wind: "Wind".into(),
            current: "current".into(),
            last1: "last hour".into(),
            last24: "last 24h".into(),
            err_fetch_token: "Could not authenticate with Netatmo".into(),
            err_fetch_refreshtoken: "Could not refresh the Netatmo access token".into(),
            err_fetch_data: "Could not fetch Netatmo station data".into(),
        }
    }
}

impl Labels {
    /// Label for a channel name (case-insensitive); unknown channels keep
    /// their reported name.
    pub fn channel<'a>(&'a self, name: &'a str) -> &'a str {
        match name.to_ascii_lowercase().as_str() {
            "temperature" => &self.temperature,
            "humidity" => &self.humidity,
            "co2" => &self.co2,
            "noise" => &self.noise,
            "pressure" => &self.pressure,
            "rain" => &self.rain,
            "wind" => &self.wind,
            _ => name,
        }
    }
}

/// How mirrored sensors are titled and decorated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub labels: Labels,
    /// Icon URL prefix; icons resolve to `<icon_base>/<channel>.png`.
    pub icon_base: String,
    /// Prefix of every registered device id.
    pub device_prefix: String,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            labels: Labels::default(),
            icon_base: DEFAULT_ICON_BASE.into(),
            device_prefix: DEFAULT_DEVICE_PREFIX.into(),
        }
    }
}

impl Presentation {
    pub fn icon(&self, channel: &str) -> String {
        format!(
            "{}/{}.png",
            self.icon_base.trim_end_matches('/'),
            channel.to_ascii_lowercase()
        )
    }
}

// ── BridgeConfig ────────────────────────────────────────────────────

/// Configuration for one account's bridge.
///
/// Built by the CLI from the config file; core never reads config files.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    /// Fixed poll cadence. Missed ticks are delayed, never bursted.
    pub poll_interval: Duration,
    /// Token refresh fires this long before the reported expiry.
    pub refresh_margin: Duration,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    pub presentation: Presentation,
}

impl BridgeConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
            poll_interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            presentation: Presentation::default(),
        }
    }

    /// Set the poll cadence from a minute count.
    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.poll_interval = Duration::from_secs(minutes.saturating_mul(60));
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            },
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn labels_fall_back_to_reported_name() {
        let labels = Labels::default();
        assert_eq!(labels.channel("CO2"), "CO2");
        assert_eq!(labels.channel("temperature"), "Temperature");
        assert_eq!(labels.channel("WindAngle"), "WindAngle");
    }

    #[test]
    fn partial_labels_keep_defaults() {
        let labels: Labels =
            serde_json::from_str(r#"{"temperature":"Température"}"#).expect("valid labels");
        assert_eq!(labels.temperature, "Température");
        assert_eq!(labels.humidity, "Humidity");
    }

    #[test]
    fn icon_urls() {
        let p = Presentation {
            icon_base: "http://hub/icons/".into(),
            ..Presentation::default()
        };
        assert_eq!(p.icon("Rain"), "http://hub/icons/rain.png");
    }

    #[test]
    fn interval_minutes_to_duration() {
        let creds = Credentials::new(
            "id",
            SecretString::from("secret".to_string()),
            "user",
            SecretString::from("pw".to_string()),
        );
        let config = BridgeConfig::new(creds).with_interval_minutes(5);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(
            BridgeConfig::new(config.credentials.clone()).poll_interval,
            Duration::from_secs(600)
        );
    }
}
