#![allow(clippy::unwrap_used)]
// Integration tests for `OAuthClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atmolink_api::{Credentials, Error, OAuthClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, OAuthClient) {
    let server = MockServer::start().await;
    let token_url = Url::parse(&format!("{}/oauth2/token", server.uri())).unwrap();
    let client = OAuthClient::with_client(reqwest::Client::new(), token_url);
    (server, client)
}

fn credentials() -> Credentials {
    Credentials::new(
        "client-123",
        SecretString::from("client-secret".to_string()),
        "owner@example.com",
        SecretString::from("hunter2".to_string()),
    )
}

// ── Password grant ──────────────────────────────────────────────────

#[tokio::test]
async fn test_password_grant_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("username=owner%40example.com"))
        .and(body_string_contains("scope=read_station"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 10800,
            "scope": ["read_station"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pair = client.password_grant(&credentials()).await.unwrap();

    assert_eq!(pair.access_token.expose_secret(), "access-1");
    assert_eq!(
        pair.refresh_token.as_ref().map(|t| t.expose_secret().to_owned()),
        Some("refresh-1".to_owned())
    );
    assert_eq!(pair.expires_in.as_secs(), 10_800);
}

#[tokio::test]
async fn test_password_grant_accepts_legacy_lifetime_field() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expire_in": 600
        })))
        .mount(&server)
        .await;

    let pair = client.password_grant(&credentials()).await.unwrap();
    assert_eq!(pair.expires_in.as_secs(), 600);
}

#[tokio::test]
async fn test_password_grant_invalid_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let result = client.password_grant(&credentials()).await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(
                message.contains("invalid_grant") && message.contains("password"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

// ── Refresh grant ───────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_grant_sends_refresh_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 10800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refresh = SecretString::from("refresh-1".to_string());
    let pair = client.refresh_grant(&credentials(), &refresh).await.unwrap();

    assert_eq!(pair.access_token.expose_secret(), "access-2");
}

#[tokio::test]
async fn test_refresh_grant_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .mount(&server)
        .await;

    let refresh = SecretString::from("stale".to_string());
    let result = client.refresh_grant(&credentials(), &refresh).await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(message.contains("refresh token revoked"), "got: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_token_body_hides_payload() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"token\":\"x\"}"))
        .mount(&server)
        .await;

    let result = client.password_grant(&credentials()).await;

    match result {
        Err(Error::Deserialization { ref body, .. }) => assert!(body.is_empty()),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
