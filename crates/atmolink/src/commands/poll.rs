//! `poll`: one fetch-and-reconcile cycle, then print the sensors.

use tracing::info;

use atmolink_core::PollOutcome;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let (bridge, _registry) = super::build_bridge(&cfg)?;

    let mut outcome = bridge.poll_once().await?;
    if outcome == PollOutcome::Reauthenticated {
        // The rejected token was replaced; fetch again with the new one.
        outcome = bridge.poll_once().await?;
    }
    if let PollOutcome::Updated(ref report) = outcome {
        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "poll complete"
        );
    }

    let sensors = bridge.sensors();
    super::print_sensors(&sensors, global)?;

    bridge.stop().await;
    Ok(())
}
