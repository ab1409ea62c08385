// atmolink-api: Async Rust client for the Netatmo weather station cloud API

pub mod auth;
pub mod error;
pub mod oauth;
pub mod station;
pub mod transport;

pub use auth::{Credentials, Endpoints, GrantType, TokenPair, refresh_after};
pub use error::Error;
pub use oauth::OAuthClient;
pub use station::{
    Administrative, DashboardData, StationClient, StationDevice, StationModule, StationsBody,
    StationsResponse, User,
};
pub use transport::{TlsMode, TransportConfig};
