//! Decoding of the opaque `items` inventory payload.
//!
//! The payload has shipped in two shapes over time: a list of
//! `{ "name", "available" }` objects and, earlier, a bare list of names. Rows
//! with neither shape still exist, so decoding is total: every input lands in
//! exactly one [`DecodedItems`] variant and nothing here can fail.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub name: String,
    pub available: bool,
}

impl ItemEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, available: bool) -> Self {
        Self {
            name: name.into(),
            available,
        }
    }
}

/// Result of classifying a raw `items` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedItems {
    /// Non-empty list of objects, read as `{ name, available }`.
    Structured(Vec<ItemEntry>),
    /// Non-empty list of bare names (legacy shape, each implicitly available).
    LegacyNames(Vec<String>),
    /// Anything else: invalid JSON, empty list, mixed lists, scalars.
    Unparseable,
}

const PLACEHOLDER_ITEMS: [(&str, bool); 5] = [
    ("Cola", true),
    ("Chips", false),
    ("Water", true),
    ("Gum", false),
    ("Energy Bar", true),
];

/// Fixed, non-empty list shown when a payload cannot be decoded.
#[must_use]
pub fn placeholder_items() -> Vec<ItemEntry> {
    PLACEHOLDER_ITEMS
        .iter()
        .map(|(name, available)| ItemEntry::new(*name, *available))
        .collect()
}

/// Classify a raw payload without substituting defaults.
#[must_use]
pub fn decode_items(raw: &str) -> DecodedItems {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) else {
        return DecodedItems::Unparseable;
    };
    if entries.is_empty() {
        return DecodedItems::Unparseable;
    }

    match &entries[0] {
        Value::Object(_) => entries
            .iter()
            .map(|entry| entry.as_object().map(structured_entry))
            .collect::<Option<Vec<_>>>()
            .map_or(DecodedItems::Unparseable, DecodedItems::Structured),
        Value::String(_) => entries
            .iter()
            .map(|entry| entry.as_str().map(ToOwned::to_owned))
            .collect::<Option<Vec<_>>>()
            .map_or(DecodedItems::Unparseable, DecodedItems::LegacyNames),
        _ => DecodedItems::Unparseable,
    }
}

/// Read whatever the object carries. A missing or non-string `name` is
/// empty; `available` counts only when it is literally `true`.
fn structured_entry(object: &serde_json::Map<String, Value>) -> ItemEntry {
    let name = object.get("name").and_then(Value::as_str).unwrap_or_default();
    let available = object
        .get("available")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    ItemEntry::new(name, available)
}

/// Decode a payload into display items.
///
/// Object entries pass through as read, legacy names become available
/// items, and everything else yields [`placeholder_items`].
#[must_use]
pub fn parse_items(raw: &str) -> Vec<ItemEntry> {
    match decode_items(raw) {
        DecodedItems::Structured(items) => items,
        DecodedItems::LegacyNames(names) => names
            .into_iter()
            .map(|name| ItemEntry::new(name, true))
            .collect(),
        DecodedItems::Unparseable => placeholder_items(),
    }
}

/// Encode items in the structured shape for submission back to the store.
#[must_use]
pub fn serialize_items(items: &[ItemEntry]) -> String {
    // A Vec of plain String/bool structs cannot fail to serialize.
    serde_json::to_string(items).unwrap_or_else(|_| String::from("[]"))
}

#[cfg(test)]
#[path = "items_test.rs"]
mod tests;
