// Station data HTTP client
//
// Wraps `reqwest::Client` with URL construction for the data API and
// classification of its `{"error": {"code": N, "message": "..."}}`
// failures. Token lifecycle is the caller's concern; every request takes
// the current access token explicitly.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::oauth::preview;
use crate::station::models::StationsResponse;
use crate::transport::TransportConfig;

/// Data API error body. Some gateways return `error` as a bare string.
#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Structured {
        code: u16,
        #[serde(default)]
        message: Option<String>,
    },
    Plain(String),
}

/// Raw HTTP client for the station data API.
#[derive(Clone)]
pub struct StationClient {
    http: reqwest::Client,
    api_url: Url,
}

impl StationClient {
    /// Create a station client from a `TransportConfig`.
    ///
    /// `api_url` is the API root (e.g. `https://api.netatmo.com`);
    /// endpoint paths are appended to it.
    pub fn new(api_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            api_url,
        })
    }

    /// Create a station client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, api_url: Url) -> Self {
        Self { http, api_url }
    }

    /// The API root URL.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Build a full URL for an API path: `{base}/api/{path}`.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.api_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    /// Fetch the full snapshot of every station visible to the account.
    ///
    /// `GET /api/getstationsdata?access_token=...`
    pub async fn get_stations_data(
        &self,
        access_token: &SecretString,
    ) -> Result<StationsResponse, Error> {
        let mut url = self.endpoint("getstationsdata")?;
        // Logged before the token is attached.
        debug!("GET {}", url);
        url.query_pairs_mut()
            .append_pair("access_token", access_token.expose_secret());

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        // The data API reports failures in a JSON envelope, usually with a
        // 4xx status but occasionally with 200.
        if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(match err.error {
                ApiErrorBody::Structured { code, message } => Error::from_api(
                    status.as_u16(),
                    Some(code),
                    message.unwrap_or_else(|| format!("error code {code}")),
                ),
                ApiErrorBody::Plain(message) => Error::from_api(status.as_u16(), None, message),
            });
        }

        if !status.is_success() {
            return Err(Error::Api {
                message: format!("HTTP {status}: {}", preview(&body)),
                code: None,
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}
