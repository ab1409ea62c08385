//! Configuration for the atmolink binary.
//!
//! TOML file + environment layering, credential resolution (env, keyring,
//! plaintext), and translation to `atmolink_core::BridgeConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atmolink_core::config::{DEFAULT_DEVICE_PREFIX, DEFAULT_ICON_BASE, DEFAULT_INTERVAL_MINUTES};
use atmolink_core::{BridgeConfig, Credentials, Endpoints, Labels, Presentation, TlsVerification};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "atmolink";

/// Environment variable overriding the account password.
pub const PASSWORD_ENV: &str = "ATMOLINK_PASSWORD";

/// Environment variable overriding the app client secret.
pub const CLIENT_SECRET_ENV: &str = "ATMOLINK_CLIENT_SECRET";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured")]
    NoCredentials { what: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub account: Account,

    #[serde(default)]
    pub polling: Polling,

    #[serde(default)]
    pub endpoints: EndpointSettings,

    #[serde(default)]
    pub display: Display,

    /// Title and notification strings; unset entries stay English.
    #[serde(default)]
    pub labels: Labels,
}

/// The Netatmo app registration and station owner account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Account {
    pub client_id: Option<String>,

    /// App client secret (plaintext; prefer keyring or env var).
    pub client_secret: Option<String>,

    pub username: Option<String>,

    /// Account password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            scope: default_scope(),
        }
    }
}

fn default_scope() -> String {
    "read_station".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Polling {
    /// Poll cadence in minutes.
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Refresh the token this many seconds before it expires.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            refresh_margin_secs: default_refresh_margin(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}
fn default_refresh_margin() -> u64 {
    60
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EndpointSettings {
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Extra CA certificate to trust (TLS-intercepting proxies).
    pub ca_cert: Option<PathBuf>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            api_url: default_api_url(),
            ca_cert: None,
        }
    }
}

fn default_token_url() -> String {
    Endpoints::default().token_url.to_string()
}
fn default_api_url() -> String {
    Endpoints::default().api_url.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Display {
    /// Icon URL prefix; `<channel>.png` is appended.
    #[serde(default = "default_icon_base")]
    pub icon_base: String,

    /// Prefix of every registered device id.
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            icon_base: default_icon_base(),
            device_prefix: default_device_prefix(),
        }
    }
}

fn default_icon_base() -> String {
    DEFAULT_ICON_BASE.into()
}
fn default_device_prefix() -> String {
    DEFAULT_DEVICE_PREFIX.into()
}

impl Config {
    /// Copy with every plaintext secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "********".to_owned());
        let mut out = self.clone();
        out.account.client_secret = mask(&self.account.client_secret);
        out.account.password = mask(&self.account.password);
        out
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "atmolink", "atmolink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("atmolink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: defaults, then the TOML file, then `ATMOLINK_`
/// environment variables (`ATMOLINK_POLLING__INTERVAL=5`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ATMOLINK_").split("__"))
}

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file yields
/// the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// A secret that can live in the keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Password,
    ClientSecret,
}

impl SecretKind {
    fn env_var(self) -> &'static str {
        match self {
            Self::Password => PASSWORD_ENV,
            Self::ClientSecret => CLIENT_SECRET_ENV,
        }
    }

    /// Keyring entry name for the owning account (username or client id).
    fn keyring_user(self, owner: &str) -> String {
        match self {
            Self::Password => format!("{owner}/password"),
            Self::ClientSecret => format!("{owner}/client-secret"),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Password => "account password",
            Self::ClientSecret => "client secret",
        }
    }
}

/// First source that yields a value wins: env var, keyring, plaintext.
fn first_secret(
    env: Option<String>,
    keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&String>,
) -> Option<SecretString> {
    env.or_else(keyring)
        .or_else(|| plaintext.cloned())
        .map(SecretString::from)
}

fn keyring_lookup(kind: SecretKind, owner: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_user(owner))
        .ok()?
        .get_password()
        .ok()
}

/// Resolve a secret from the credential chain.
pub fn resolve_secret(
    kind: SecretKind,
    owner: &str,
    plaintext: Option<&String>,
) -> Result<SecretString, ConfigError> {
    first_secret(
        std::env::var(kind.env_var()).ok(),
        || keyring_lookup(kind, owner),
        plaintext,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        what: kind.describe().into(),
    })
}

/// Store a secret in the system keyring.
pub fn store_secret(kind: SecretKind, owner: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &kind.keyring_user(owner))
        .and_then(|entry| entry.set_password(secret))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation ─────────────────────────────────────────────────────

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, ConfigError> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: field.into(),
            reason: "must be set".into(),
        })
}

fn parse_url(raw: &str, field: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Validate the non-secret parts of a config.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    required(cfg.account.client_id.as_ref(), "account.client_id")?;
    required(cfg.account.username.as_ref(), "account.username")?;
    if cfg.polling.interval == 0 {
        return Err(ConfigError::Validation {
            field: "polling.interval".into(),
            reason: "must be at least 1 minute".into(),
        });
    }
    parse_url(&cfg.endpoints.token_url, "endpoints.token_url")?;
    parse_url(&cfg.endpoints.api_url, "endpoints.api_url")?;
    Ok(())
}

/// Build a `BridgeConfig`, resolving secrets through the credential chain.
pub fn to_bridge_config(cfg: &Config) -> Result<BridgeConfig, ConfigError> {
    validate(cfg)?;
    let client_id = required(cfg.account.client_id.as_ref(), "account.client_id")?;
    let username = required(cfg.account.username.as_ref(), "account.username")?;

    let client_secret = resolve_secret(
        SecretKind::ClientSecret,
        client_id,
        cfg.account.client_secret.as_ref(),
    )?;
    let password = resolve_secret(SecretKind::Password, username, cfg.account.password.as_ref())?;

    let mut credentials = Credentials::new(client_id, client_secret, username, password);
    credentials.scope.clone_from(&cfg.account.scope);

    let mut bridge = BridgeConfig::new(credentials).with_interval_minutes(cfg.polling.interval);
    bridge.endpoints = Endpoints {
        token_url: parse_url(&cfg.endpoints.token_url, "endpoints.token_url")?,
        api_url: parse_url(&cfg.endpoints.api_url, "endpoints.api_url")?,
    };
    bridge.refresh_margin = Duration::from_secs(cfg.polling.refresh_margin_secs);
    bridge.timeout = Duration::from_secs(cfg.polling.timeout_secs);
    bridge.tls = cfg
        .endpoints
        .ca_cert
        .clone()
        .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa);
    bridge.presentation = Presentation {
        labels: cfg.labels.clone(),
        icon_base: cfg.display.icon_base.clone(),
        device_prefix: cfg.display.device_prefix.clone(),
    };
    Ok(bridge)
}
