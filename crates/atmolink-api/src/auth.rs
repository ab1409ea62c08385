use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use url::Url;

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.netatmo.net/oauth2/token";

/// Default base URL for the data API (`/api/...` is appended).
pub const DEFAULT_API_URL: &str = "https://api.netatmo.com";

/// Scope requested by the password grant.
pub const DEFAULT_SCOPE: &str = "read_station";

/// OAuth2 grant used for a token exchange.
///
/// Marker enum (no data) -- the secret material lives in [`Credentials`]
/// and [`TokenPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Resource-owner password grant (full re-authentication).
    Password,
    /// Refresh grant using a previously issued refresh token.
    RefreshToken,
}

impl GrantType {
    /// The `grant_type` form value sent to the token endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Account credentials for the password grant.
///
/// The client id/secret identify the registered Netatmo app; the
/// username/password identify the station owner.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    pub scope: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            username: username.into(),
            password,
            scope: DEFAULT_SCOPE.into(),
        }
    }
}

/// Where the two API surfaces live. Overridable for tests and proxies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token_url: Url,
    pub api_url: Url,
}

impl Endpoints {
    /// Point both surfaces at a single base URL (e.g. a mock server).
    pub fn with_base(base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        Ok(Self {
            token_url: base.join("/oauth2/token")?,
            api_url: base,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("valid default token URL"),
            api_url: Url::parse(DEFAULT_API_URL).expect("valid default API URL"),
        }
    }
}

/// An issued access/refresh token pair plus expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Lifetime reported by the server at issue time.
    pub expires_in: Duration,
    /// When the pair was received.
    pub obtained_at: DateTime<Utc>,
}

impl TokenPair {
    /// Absolute expiry instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.expires_in)
            .ok()
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the token can still be used at `now`.
    ///
    /// The usable window ends when the refresh is due (see
    /// [`refresh_after`]), so a lifetime at or below `margin` stays valid
    /// for half its length rather than expiring on issue.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        TimeDelta::from_std(refresh_after(self.expires_in, margin))
            .ok()
            .and_then(|window| self.obtained_at.checked_add_signed(window))
            .is_some_and(|deadline| now < deadline)
    }
}

/// How long after issue a token living `expires_in` should be refreshed.
///
/// `margin` before expiry when the lifetime allows it, otherwise half the
/// lifetime. Always strictly earlier than `expires_in` for any non-zero
/// lifetime, including a zero margin.
pub fn refresh_after(expires_in: Duration, margin: Duration) -> Duration {
    if !margin.is_zero() && expires_in > margin {
        expires_in - margin
    } else {
        expires_in / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(expires_in: u64) -> TokenPair {
        TokenPair {
            access_token: SecretString::from("access".to_string()),
            refresh_token: Some(SecretString::from("refresh".to_string())),
            expires_in: Duration::from_secs(expires_in),
            obtained_at: DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp"),
        }
    }

    #[test]
    fn expires_at_adds_lifetime() {
        let p = pair(10_800);
        assert_eq!(p.expires_at().timestamp(), 1_700_010_800);
    }

    #[test]
    fn validity_respects_margin() {
        let p = pair(100);
        let margin = Duration::from_secs(10);
        let at = |secs: i64| DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid");
        assert!(p.is_valid_at(at(0), margin));
        assert!(p.is_valid_at(at(89), margin));
        assert!(!p.is_valid_at(at(90), margin));
        assert!(!p.is_valid_at(at(200), margin));
    }

    #[test]
    fn short_lifetime_stays_valid_for_half() {
        let p = pair(30);
        let margin = Duration::from_secs(60);
        let at = |secs: i64| DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid");
        assert!(p.is_valid_at(at(0), margin));
        assert!(p.is_valid_at(at(14), margin));
        assert!(!p.is_valid_at(at(15), margin));
    }

    #[test]
    fn zero_margin_matches_refresh_window() {
        let p = pair(100);
        let at = |secs: i64| DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid");
        assert!(p.is_valid_at(at(49), Duration::ZERO));
        assert!(!p.is_valid_at(at(50), Duration::ZERO));
    }

    #[test]
    fn grant_type_form_values() {
        assert_eq!(GrantType::Password.as_str(), "password");
        assert_eq!(GrantType::RefreshToken.as_str(), "refresh_token");
    }

    #[test]
    fn endpoints_with_base_share_host() {
        let e = Endpoints::with_base("http://127.0.0.1:9999").expect("valid base");
        assert_eq!(e.token_url.as_str(), "http://127.0.0.1:9999/oauth2/token");
        assert_eq!(e.api_url.as_str(), "http://127.0.0.1:9999/");
    }
}
