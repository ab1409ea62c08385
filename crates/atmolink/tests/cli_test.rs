#![allow(clippy::unwrap_used)]
// Smoke tests for the `atmolink` binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn atmolink(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("atmolink").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("ATMOLINK_PASSWORD")
        .env_remove("ATMOLINK_CLIENT_SECRET")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn server_config(server_uri: &str) -> String {
    format!(
        r#"
[account]
client_id = "client-123"
client_secret = "client-secret"
username = "owner@example.com"
password = "hunter2"

[endpoints]
token_url = "{server_uri}/oauth2/token"
api_url = "{server_uri}"
"#
    )
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("atmolink")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("poll"))
        .stdout(predicate::str::contains("token"));
}

#[test]
fn completions_generate() {
    Command::cargo_bin("atmolink")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("atmolink"));
}

#[test]
fn config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    atmolink(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn config_show_masks_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &server_config("https://api.example.test"));
    atmolink(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("owner@example.com"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn poll_without_account_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[polling]\ninterval = 5\n");
    atmolink(&path)
        .arg("poll")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("account.client_id"));
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_prints_mirrored_sensors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 10_800
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/getstationsdata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "body": {
                "user": { "administrative": { "unit": 0 } },
                "devices": [{
                    "_id": "70:ee:50:00:00:01",
                    "module_name": "Living room",
                    "data_type": ["Temperature", "CO2", "Humidity", "Noise", "Pressure"],
                    "dashboard_data": {
                        "Temperature": 21.4,
                        "Humidity": 48,
                        "CO2": 640,
                        "Noise": 38,
                        "Pressure": 1012.3
                    },
                    "modules": []
                }]
            }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &server_config(&server.uri()));

    let assert = tokio::task::spawn_blocking(move || {
        atmolink(&path).args(["poll", "-o", "json"]).assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Living room Temperature"))
        .stdout(predicate::str::contains("21.4"))
        .stdout(predicate::str::contains("atmolink_co2_70_ee_50_00_00_01_70_ee_50_00_00_01"));
}

#[tokio::test(flavor = "multi_thread")]
async fn token_reports_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &server_config(&server.uri()));

    let assert = tokio::task::spawn_blocking(move || atmolink(&path).arg("token").assert())
        .await
        .unwrap();

    assert.failure().code(3);
}
