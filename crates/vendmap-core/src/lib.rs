pub mod app_config;
pub mod buildings;
pub mod config;
pub mod draft;
pub mod items;
pub mod machine;
pub mod proximity;
pub mod selection;
pub mod store;

pub use app_config::{AppConfig, Environment};
pub use buildings::{load_buildings, Building, BuildingDirectory, BuildingsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use draft::{LocationPermission, MachineDraft};
pub use items::{
    decode_items, parse_items, placeholder_items, serialize_items, DecodedItems, ItemEntry,
};
pub use machine::{coerce_coordinate, Coordinates, MachineUpdate, NewMachine, VendingMachineRecord};
pub use proximity::{ProximityGrouper, DEFAULT_TOLERANCE_DEG};
pub use selection::{GroupKey, GroupSelection, MapSurface, Selection, SelectionController};
pub use store::{MachineStore, MapView, Popup};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read buildings file {path}: {source}")]
    BuildingsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse buildings file: {0}")]
    BuildingsFileParse(#[source] serde_yaml::Error),

    #[error("buildings validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("proximity tolerance must be a finite positive number, got {0}")]
    InvalidTolerance(f64),

    #[error("location access denied; adding a vending machine requires your current location")]
    LocationDenied,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("coordinates out of range: lat {lat}, lon {lon}")]
    CoordinatesOutOfRange { lat: f64, lon: f64 },
}
