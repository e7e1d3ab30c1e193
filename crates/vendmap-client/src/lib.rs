//! HTTP client for the vendmap REST API.

mod client;
mod error;
mod types;

pub use client::{refresh_view, VendmapClient};
pub use error::ClientError;
pub use types::{BuildingSearch, CurrentUser, Health, ImageUpload, MapKey};
