use thiserror::Error;

/// Netatmo API error codes that mean the access token itself is the problem
/// (missing, invalid, expired). Re-authenticating resolves these.
pub const TOKEN_ERROR_CODES: [u16; 3] = [1, 2, 3];

/// Top-level error type for the `atmolink-api` crate.
///
/// Covers every failure mode of both API surfaces: the OAuth2 token
/// endpoint and the station data endpoint. `atmolink-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token grant rejected (bad credentials, revoked refresh token, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The data endpoint refused the access token (codes 1-3).
    #[error("Access token rejected (code {code}): {message}")]
    InvalidToken { code: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Station API ─────────────────────────────────────────────────
    /// Structured error from the data API (`{"error":{"code":N,"message":"..."}}`).
    #[error("Netatmo API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<u16>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the access token is no longer
    /// accepted and a fresh password grant should fix it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::InvalidToken { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Extract the Netatmo error code, if the API supplied one.
    pub fn api_error_code(&self) -> Option<u16> {
        match self {
            Self::InvalidToken { code, .. } => Some(*code),
            Self::Api { code, .. } => *code,
            _ => None,
        }
    }

    /// Classify a structured data-API error by its code.
    pub(crate) fn from_api(status: u16, code: Option<u16>, message: String) -> Self {
        match code {
            Some(code) if TOKEN_ERROR_CODES.contains(&code) => Self::InvalidToken { code, message },
            _ => Self::Api {
                message,
                code,
                status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_codes_classify_as_invalid_token() {
        for code in TOKEN_ERROR_CODES {
            let err = Error::from_api(403, Some(code), "Invalid access token".into());
            assert!(err.is_auth_expired(), "code {code} should be a token error");
            assert_eq!(err.api_error_code(), Some(code));
        }
    }

    #[test]
    fn other_codes_stay_api_errors() {
        let err = Error::from_api(403, Some(26), "User usage reached".into());
        assert!(!err.is_auth_expired());
        assert!(!err.is_transient());
        assert!(matches!(err, Error::Api { code: Some(26), status: 403, .. }));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::from_api(503, None, "unavailable".into());
        assert!(err.is_transient());
    }
}
