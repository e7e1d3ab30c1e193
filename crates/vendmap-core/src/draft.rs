//! Add/edit form state for a vending machine.

use crate::items::{decode_items, DecodedItems, ItemEntry};
use crate::machine::{Coordinates, MachineUpdate, NewMachine, VendingMachineRecord};
use crate::CoreError;

/// Browser geolocation permission as last reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationPermission {
    Granted,
    Prompt,
    Denied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineDraft {
    pub location: String,
    pub desc: String,
    pub available: bool,
    pub position: Option<Coordinates>,
    items: Vec<ItemEntry>,
    items_edited: bool,
}

impl MachineDraft {
    /// Open a blank add form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LocationDenied`] when location access was denied;
    /// the caller must cancel the add flow.
    pub fn begin(permission: LocationPermission) -> Result<Self, CoreError> {
        if permission == LocationPermission::Denied {
            return Err(CoreError::LocationDenied);
        }
        Ok(Self {
            location: String::new(),
            desc: String::new(),
            available: true,
            position: None,
            items: Vec::new(),
            items_edited: false,
        })
    }

    /// Open an edit form pre-filled from an existing record.
    ///
    /// An undecodable stored inventory starts as an empty list; the display
    /// placeholder never enters the form.
    #[must_use]
    pub fn from_record(record: &VendingMachineRecord) -> Self {
        let items = match decode_items(&record.items) {
            DecodedItems::Structured(items) => items,
            DecodedItems::LegacyNames(names) => names
                .into_iter()
                .map(|name| ItemEntry::new(name, true))
                .collect(),
            DecodedItems::Unparseable => Vec::new(),
        };
        Self {
            location: record.location.clone(),
            desc: record.desc.clone(),
            available: record.available,
            position: Some(record.coordinates()),
            items,
            items_edited: false,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[ItemEntry] {
        &self.items
    }

    pub fn set_position(&mut self, at: Coordinates) {
        self.position = Some(at);
    }

    /// Append an available item. Blank names are ignored; surrounding
    /// whitespace is trimmed. Returns whether an item was added.
    pub fn add_item(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.items.push(ItemEntry::new(name, true));
        self.items_edited = true;
        true
    }

    pub fn toggle_item(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.available = !item.available;
            self.items_edited = true;
        }
    }

    pub fn remove_item(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
            self.items_edited = true;
        }
    }

    /// Validate the draft as a new machine.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] when the position, location, or
    /// description is missing, and [`CoreError::CoordinatesOutOfRange`] for
    /// impossible coordinates.
    pub fn into_new_machine(self) -> Result<NewMachine, CoreError> {
        let position = self.position.ok_or(CoreError::MissingField("position"))?;
        if !position.is_in_range() {
            return Err(CoreError::CoordinatesOutOfRange {
                lat: position.lat,
                lon: position.lon,
            });
        }
        let location = self.location.trim().to_owned();
        if location.is_empty() {
            return Err(CoreError::MissingField("location"));
        }
        let desc = self.desc.trim().to_owned();
        if desc.is_empty() {
            return Err(CoreError::MissingField("desc"));
        }

        Ok(NewMachine {
            lat: position.lat,
            lon: position.lon,
            location,
            desc,
            available: self.available,
            items: self.items,
        })
    }

    /// The edit payload: only items and availability are mutable. Items are
    /// sent only when one was added, toggled, or removed.
    #[must_use]
    pub fn into_update(self) -> MachineUpdate {
        MachineUpdate {
            items: self.items_edited.then_some(self.items),
            available: Some(self.available),
        }
    }
}
