//! Popup selection state for the map view.
//!
//! At most one popup is open at a time: either a single-machine card or a
//! multi-machine card for a co-located group. All transitions are synchronous
//! and infallible.

use crate::machine::{Coordinates, VendingMachineRecord};
use crate::proximity::ProximityGrouper;

/// The map widget the controller drives. Implemented by the rendering layer.
pub trait MapSurface {
    /// Pan/center the map on the given coordinates.
    fn pan_to(&mut self, at: Coordinates);

    /// Clear any in-progress search-suggestion list.
    fn clear_search_suggestions(&mut self) {}
}

/// Key identifying a co-located group, derived from the clicked machine's
/// coordinates quantized to the grouping tolerance. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub lat_cell: i64,
    pub lon_cell: i64,
}

impl GroupKey {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_coordinates(at: Coordinates, tolerance: f64) -> Self {
        Self {
            lat_cell: (at.lat / tolerance).round() as i64,
            lon_cell: (at.lon / tolerance).round() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSelection {
    pub key: GroupKey,
    /// Member ids in store order at the time of the click.
    pub machine_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Idle,
    Single(i64),
    Group(GroupSelection),
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    grouper: ProximityGrouper,
    selection: Selection,
}

impl SelectionController {
    #[must_use]
    pub fn new(grouper: ProximityGrouper) -> Self {
        Self {
            grouper,
            selection: Selection::Idle,
        }
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn grouper(&self) -> &ProximityGrouper {
        &self.grouper
    }

    /// Handle a click on the marker for `clicked`.
    ///
    /// A group of more than one machine always opens the group card, closing
    /// any single card. A lone machine toggles: clicking the machine whose card
    /// is already open closes it. Every click pans the map to the marker.
    pub fn on_marker_click<S>(
        &mut self,
        clicked: &VendingMachineRecord,
        all: &[VendingMachineRecord],
        surface: &mut S,
    ) -> &Selection
    where
        S: MapSurface + ?Sized,
    {
        let group = self.grouper.group_at(clicked, all);

        let next = if group.len() > 1 {
            Selection::Group(GroupSelection {
                key: GroupKey::from_coordinates(clicked.coordinates(), self.grouper.tolerance()),
                machine_ids: group.iter().map(|m| m.id).collect(),
            })
        } else if self.selection == Selection::Single(clicked.id) {
            Selection::Idle
        } else {
            Selection::Single(clicked.id)
        };

        surface.pan_to(clicked.coordinates());
        self.selection = next;
        &self.selection
    }

    /// Explicit dismiss of whichever popup is open.
    pub fn close(&mut self) {
        self.selection = Selection::Idle;
    }

    /// Single entry point for a click on the map background: closes popups and
    /// clears search suggestions.
    pub fn dismiss_all_overlays<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        self.selection = Selection::Idle;
        surface.clear_search_suggestions();
    }
}

#[cfg(test)]
#[path = "selection_test.rs"]
mod tests;
