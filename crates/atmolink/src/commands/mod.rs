//! Command handlers and the shared bridge setup they use.

pub mod config_cmd;
pub mod poll;
pub mod run;
pub mod token;

use std::sync::Arc;

use tabled::Tabled;

use atmolink_config::Config;
use atmolink_core::{Bridge, DeviceRegistry, MemoryRegistry, TracingNotifier, VirtualSensor};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Load the config from `--config` or the platform default path.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match global.config {
        Some(ref path) => atmolink_config::load_config_from(path)?,
        None => atmolink_config::load_config()?,
    };
    Ok(cfg)
}

/// Build a bridge over an in-memory registry from a loaded config.
pub fn build_bridge(cfg: &Config) -> Result<(Bridge, Arc<MemoryRegistry>), CliError> {
    let bridge_config = atmolink_config::to_bridge_config(cfg)?;
    let registry = Arc::new(MemoryRegistry::new());
    let shared: Arc<dyn DeviceRegistry> = registry.clone();
    let bridge = Bridge::new(bridge_config, shared, Arc::new(TracingNotifier))?;
    Ok((bridge, registry))
}

// ── Sensor rendering ────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn sensor_row(sensor: &VirtualSensor, color: bool) -> SensorRow {
    let value = sensor.level.map_or_else(
        || output::dim("-", color),
        |level| format!("{level} {}", sensor.unit),
    );
    let updated = sensor.updated_at.map_or_else(
        || output::dim("never", color),
        |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    SensorRow {
        id: sensor.id.to_string(),
        title: sensor.title.clone(),
        value,
        updated,
    }
}

/// Print sensors in the format chosen by `--output`.
pub fn print_sensors(sensors: &[Arc<VirtualSensor>], global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        sensors,
        |s| sensor_row(s, color),
        |s| s.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
