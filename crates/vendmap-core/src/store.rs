use crate::machine::VendingMachineRecord;
use crate::proximity::ProximityGrouper;
use crate::selection::{MapSurface, Selection, SelectionController};

/// The fetched machine list, kept in the order the API returned it.
///
/// Only ever replaced wholesale: create and edit flows re-fetch the full list
/// instead of patching individual records.
#[derive(Debug, Clone, Default)]
pub struct MachineStore {
    records: Vec<VendingMachineRecord>,
}

impl MachineStore {
    #[must_use]
    pub fn new(records: Vec<VendingMachineRecord>) -> Self {
        Self { records }
    }

    pub fn replace_all(&mut self, records: Vec<VendingMachineRecord>) {
        self.records = records;
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&VendingMachineRecord> {
        self.records.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn records(&self) -> &[VendingMachineRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What the map should currently render on top of its markers.
#[derive(Debug, PartialEq)]
pub enum Popup<'a> {
    None,
    Single(&'a VendingMachineRecord),
    Group(Vec<&'a VendingMachineRecord>),
}

/// One map view instance: owns the machine list and the popup selection.
#[derive(Debug, Clone, Default)]
pub struct MapView {
    store: MachineStore,
    controller: SelectionController,
}

impl MapView {
    #[must_use]
    pub fn new(grouper: ProximityGrouper) -> Self {
        Self {
            store: MachineStore::default(),
            controller: SelectionController::new(grouper),
        }
    }

    #[must_use]
    pub fn store(&self) -> &MachineStore {
        &self.store
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        self.controller.selection()
    }

    /// Replace the machine list after a fetch completes.
    ///
    /// The open selection is left alone; ids that no longer resolve are simply
    /// dropped by [`MapView::active_popup`].
    pub fn refresh(&mut self, records: Vec<VendingMachineRecord>) {
        self.store.replace_all(records);
    }

    /// Click on the marker for machine `id`. Unknown ids are ignored.
    pub fn click_marker<S>(&mut self, id: i64, surface: &mut S) -> &Selection
    where
        S: MapSurface + ?Sized,
    {
        match self.store.get(id) {
            Some(clicked) => {
                self.controller
                    .on_marker_click(clicked, self.store.records(), surface)
            }
            None => self.controller.selection(),
        }
    }

    pub fn close_popup(&mut self) {
        self.controller.close();
    }

    pub fn background_click<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        self.controller.dismiss_all_overlays(surface);
    }

    /// Resolve the selection against the current store.
    #[must_use]
    pub fn active_popup(&self) -> Popup<'_> {
        match self.controller.selection() {
            Selection::Idle => Popup::None,
            Selection::Single(id) => self.store.get(*id).map_or(Popup::None, Popup::Single),
            Selection::Group(group) => {
                let members: Vec<&VendingMachineRecord> = group
                    .machine_ids
                    .iter()
                    .filter_map(|id| self.store.get(*id))
                    .collect();
                if members.is_empty() {
                    Popup::None
                } else {
                    Popup::Group(members)
                }
            }
        }
    }
}
