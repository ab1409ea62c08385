//! `run`: poll until interrupted, then remove every virtual sensor.

use tracing::{debug, info};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = super::load(global)?;
    if let Some(interval) = args.interval {
        cfg.polling.interval = interval;
    }

    let (bridge, registry) = super::build_bridge(&cfg)?;
    bridge.start().await?;
    info!(
        sensors = registry.len(),
        interval_minutes = cfg.polling.interval,
        "polling; press Ctrl-C to stop"
    );

    let mut sensors = registry.subscribe();
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
            changed = sensors.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!(
                    sensors = sensors.borrow_and_update().len(),
                    version = registry.version(),
                    "registry updated"
                );
            }
        }
    }

    info!("shutting down");
    bridge.stop().await;
    Ok(())
}
