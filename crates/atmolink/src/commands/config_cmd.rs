//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Input, Select};

use atmolink_config::{Config, SecretKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn target_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(atmolink_config::config_path)
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    kind: SecretKind,
    owner: &str,
    secret: String,
    label: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        atmolink_config::store_secret(kind, owner, &secret)?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, CliError> {
    value
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Validation {
            field: field.into(),
            reason: "must be set first (run: atmolink config init)".into(),
        })
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = target_path(global);
    eprintln!("atmolink configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let mut cfg = match global.config {
        Some(ref p) => atmolink_config::load_config_from(p)?,
        None => atmolink_config::load_config()?,
    };

    let client_id: String = Input::new()
        .with_prompt("App client id")
        .with_initial_text(cfg.account.client_id.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;
    let client_secret = prompt_secret("App client secret: ", "account.client_secret")?;

    let username: String = Input::new()
        .with_prompt("Netatmo account e-mail")
        .with_initial_text(cfg.account.username.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;
    let password = prompt_secret("Account password: ", "account.password")?;

    let interval: u64 = Input::new()
        .with_prompt("Poll interval (minutes)")
        .default(cfg.polling.interval)
        .validate_with(|v: &u64| {
            if *v == 0 {
                Err("must be at least 1")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(prompt_err)?;

    cfg.account.client_secret = prompt_keyring_storage(
        SecretKind::ClientSecret,
        &client_id,
        client_secret,
        "client secret",
    )?;
    cfg.account.password =
        prompt_keyring_storage(SecretKind::Password, &username, password, "password")?;
    cfg.account.client_id = Some(client_id);
    cfg.account.username = Some(username);
    cfg.polling.interval = interval;

    atmolink_config::validate(&cfg)?;
    atmolink_config::save_config_to(&cfg, &path)?;
    eprintln!("\n   ✓ Configuration saved to {}", path.display());
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&target_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = super::load(global)?;
            let rendered = toml::to_string_pretty(&cfg.redacted()).map_err(|e| {
                CliError::Config {
                    message: e.to_string(),
                }
            })?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => init(global),

        ConfigCommand::SetPassword => {
            let cfg = super::load(global)?;
            let username = required(cfg.account.username.as_ref(), "account.username")?;
            let password = prompt_secret("Account password: ", "account.password")?;
            atmolink_config::store_secret(SecretKind::Password, username, &password)?;
            if !global.quiet {
                eprintln!("Password stored in system keyring for {username}");
            }
            Ok(())
        }

        ConfigCommand::SetSecret => {
            let cfg = super::load(global)?;
            let client_id = required(cfg.account.client_id.as_ref(), "account.client_id")?;
            let secret = prompt_secret("App client secret: ", "account.client_secret")?;
            atmolink_config::store_secret(SecretKind::ClientSecret, client_id, &secret)?;
            if !global.quiet {
                eprintln!("Client secret stored in system keyring for {client_id}");
            }
            Ok(())
        }
    }
}
