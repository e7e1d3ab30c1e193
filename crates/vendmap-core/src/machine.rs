use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::items::{parse_items, ItemEntry};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns `true` when both components are finite and within the WGS84
    /// ranges (`-90..=90`, `-180..=180`).
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// One physical vending machine as returned by the REST API.
///
/// `lat`/`lon` are stored as `NUMERIC` in Postgres and usually arrive as
/// decimal strings; both string and number forms are accepted and coerced to
/// `f64` here so that geometry never sees a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendingMachineRecord {
    pub id: i64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub lon: f64,
    pub location: String,
    pub desc: String,
    pub available: bool,
    /// Opaque inventory payload. Decode with [`crate::parse_items`].
    pub items: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VendingMachineRecord {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// Inventory decoded for display. Never fails; see [`crate::parse_items`].
    #[must_use]
    pub fn parsed_items(&self) -> Vec<ItemEntry> {
        parse_items(&self.items)
    }

    /// The stored photo URL, or `None` when the UI should show its placeholder.
    #[must_use]
    pub fn photo_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Payload for creating a machine. The image, if any, travels separately as a
/// multipart file part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMachine {
    pub lat: f64,
    pub lon: f64,
    pub location: String,
    pub desc: String,
    pub available: bool,
    pub items: Vec<ItemEntry>,
}

/// Sparse edit payload: only `items` and `available` are mutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl MachineUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_none() && self.available.is_none()
    }
}

/// Coerce a JSON number or numeric string into a finite `f64`.
///
/// Returns `None` for anything else, including `NaN`/`inf` spellings.
#[must_use]
pub fn coerce_coordinate(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn deserialize_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    coerce_coordinate(&value)
        .ok_or_else(|| de::Error::custom(format!("expected a numeric coordinate, got {value}")))
}
