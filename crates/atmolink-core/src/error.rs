// ── Core error types ──
//
// User-facing errors from atmolink-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<atmolink_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Access token rejected (code {code}): {message}")]
    TokenRejected { code: u16, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Netatmo error code, when the API supplied one.
        code: Option<u16>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Bridge is already running")]
    AlreadyRunning,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error came from credentials the server refused.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::TokenRejected { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<atmolink_api::Error> for CoreError {
    fn from(err: atmolink_api::Error) -> Self {
        match err {
            atmolink_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            atmolink_api::Error::InvalidToken { code, message } => {
                CoreError::TokenRejected { code, message }
            }
            atmolink_api::Error::Transport(e) => {
                // Report the URL without its query, which may carry the
                // access token, and keep it out of the message too.
                let url = e.url().map_or_else(
                    || "<unknown>".into(),
                    |u| {
                        let mut u = u.clone();
                        u.set_query(None);
                        u.to_string()
                    },
                );
                let status = e.status().map(|s| s.as_u16());
                let (timeout, connect) = (e.is_timeout(), e.is_connect());
                let e = e.without_url();
                if timeout {
                    CoreError::Timeout { url }
                } else if connect {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status,
                    }
                }
            }
            atmolink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            atmolink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            atmolink_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            atmolink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
