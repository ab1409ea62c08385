// OAuth2 token endpoint client
//
// Password and refresh grants against the Netatmo token endpoint.
// Both grants post a form-encoded body and receive the same
// `{access_token, refresh_token, expires_in}` JSON shape.

use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::auth::{Credentials, GrantType, TokenPair};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw token grant response. Kept private so the plain-text tokens never
/// escape without being wrapped in `SecretString`.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    /// Older API revisions spell the lifetime without the `s`.
    #[serde(default)]
    expire_in: Option<u64>,
}

/// OAuth2 error body: `{"error": "invalid_grant", "error_description": "..."}`.
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Lifetime assumed when the server omits `expires_in`.
const FALLBACK_LIFETIME: Duration = Duration::from_secs(3 * 60 * 60);

/// HTTP client for the OAuth2 token endpoint.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: Url,
}

impl OAuthClient {
    /// Create a token client from a `TransportConfig`.
    pub fn new(token_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            token_url,
        })
    }

    /// Create a token client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, token_url: Url) -> Self {
        Self { http, token_url }
    }

    /// The token endpoint URL.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Exchange the account credentials for a fresh token pair.
    ///
    /// `POST /oauth2/token` with `grant_type=password`.
    pub async fn password_grant(&self, credentials: &Credentials) -> Result<TokenPair, Error> {
        debug!(username = %credentials.username, "requesting password grant");
        let form = [
            ("grant_type", GrantType::Password.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.expose_secret()),
            ("scope", credentials.scope.as_str()),
        ];
        self.exchange(GrantType::Password, &form).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// `POST /oauth2/token` with `grant_type=refresh_token`.
    pub async fn refresh_grant(
        &self,
        credentials: &Credentials,
        refresh_token: &SecretString,
    ) -> Result<TokenPair, Error> {
        debug!("requesting refresh grant");
        let form = [
            ("grant_type", GrantType::RefreshToken.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
        ];
        self.exchange(GrantType::RefreshToken, &form).await
    }

    async fn exchange(&self, grant: GrantType, form: &[(&str, &str)]) -> Result<TokenPair, Error> {
        let resp = self
            .http
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{} ({desc})", err.error),
                    None => err.error,
                },
                Err(_) => format!("HTTP {status}: {}", preview(&body)),
            };
            return Err(Error::Authentication {
                message: format!("{} grant rejected: {message}", grant.as_str()),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("invalid token response: {e}"),
                // Never echo a body that may carry live tokens.
                body: String::new(),
            }
        })?;

        let expires_in = token
            .expires_in
            .or(token.expire_in)
            .map_or(FALLBACK_LIFETIME, Duration::from_secs);

        debug!(grant = grant.as_str(), expires_in_secs = expires_in.as_secs(), "token issued");

        Ok(TokenPair {
            access_token: SecretString::from(token.access_token),
            refresh_token: token.refresh_token.map(SecretString::from),
            expires_in,
            obtained_at: Utc::now(),
        })
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
