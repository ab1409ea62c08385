//! `token`: verify the credentials by running a password grant.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TokenStatus {
    username: String,
    expires_at: Option<DateTime<Utc>>,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load(global)?;
    let (bridge, _registry) = super::build_bridge(&cfg)?;

    let status = TokenStatus {
        username: cfg.account.username.clone().unwrap_or_default(),
        expires_at: bridge.authenticate().await?,
    };
    bridge.stop().await;

    let out = output::render_single(
        global.output,
        &status,
        |s| {
            let expiry = s
                .expires_at
                .map_or_else(|| "unknown".to_owned(), |at| at.to_rfc3339());
            format!("Authenticated as {}\nToken expires at {expiry}", s.username)
        },
        |s| s.expires_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
