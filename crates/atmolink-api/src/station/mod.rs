// Station data API
//
// `getstationsdata` client and its response types.

pub mod client;
pub mod models;

pub use client::StationClient;
pub use models::{
    Administrative, DashboardData, StationDevice, StationModule, StationsBody, StationsResponse,
    User,
};
