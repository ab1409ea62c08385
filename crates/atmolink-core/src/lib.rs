//! Station polling and virtual sensor reconciliation on top of `atmolink-api`.
//!
//! - **[`Bridge`]**: lifecycle facade. [`start()`](Bridge::start) runs an
//!   initial poll and spawns the fixed-interval poll task,
//!   [`stop()`](Bridge::stop) cancels it and removes every virtual sensor.
//!   [`poll_once()`](Bridge::poll_once) runs a single cycle without timers.
//!
//! - **[`TokenManager`]**: Password and refresh grants behind a
//!   single-flight async mutex, with exactly one refresh timer armed at a
//!   time.
//!
//! - **[`Reconciler`]**: Keeps a [`DeviceRegistry`] in line with each
//!   station snapshot: full rebuild when the station count changes, in-place
//!   metric updates otherwise.
//!
//! - **Domain model** ([`model`]): Snapshots, channel kinds and units,
//!   stable [`SensorKey`]s and the [`VirtualSensor`] view of a registered
//!   device.

pub mod bridge;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod registry;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeState, PollOutcome};
pub use config::{BridgeConfig, Labels, Presentation, TlsVerification};
pub use error::CoreError;
pub use notify::{Notification, Notifier, Severity, TracingNotifier};
pub use reconcile::{Phase, ReconcileReport, Reconciler};
pub use registry::{DeviceRegistry, MemoryRegistry};
pub use token::{TokenManager, refresh_delay};

pub use model::{
    Accumulator, ChannelKind, DeviceId, DeviceParams, MetricUpdate, Module, Readings, SensorKey,
    Snapshot, Station, TemperatureUnit, UnitSystem, VirtualSensor, unit_label,
};

// Credential types callers need to build a `BridgeConfig`.
pub use atmolink_api::{Credentials, Endpoints};
