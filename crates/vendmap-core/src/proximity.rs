use crate::machine::VendingMachineRecord;
use crate::CoreError;

/// Default co-location tolerance in degrees (roughly one metre of latitude).
///
/// Machines in the same building share coordinates to six decimal places, so
/// this sits above `NUMERIC(9,6)` rounding and well below the spacing between
/// buildings.
pub const DEFAULT_TOLERANCE_DEG: f64 = 1e-5;

/// Groups machines that share (approximately) the same coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityGrouper {
    tolerance: f64,
}

impl Default for ProximityGrouper {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE_DEG,
        }
    }
}

impl ProximityGrouper {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTolerance`] unless `tolerance` is finite and
    /// strictly positive.
    pub fn new(tolerance: f64) -> Result<Self, CoreError> {
        if tolerance.is_finite() && tolerance > 0.0 {
            Ok(Self { tolerance })
        } else {
            Err(CoreError::InvalidTolerance(tolerance))
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns `true` when both axes differ by strictly less than the tolerance.
    #[must_use]
    pub fn co_located(&self, a: &VendingMachineRecord, b: &VendingMachineRecord) -> bool {
        (a.lat - b.lat).abs() < self.tolerance && (a.lon - b.lon).abs() < self.tolerance
    }

    /// Machines co-located with `clicked`, in store order.
    ///
    /// `clicked` is always a member: it is matched by id so that a record with
    /// non-finite coordinates still groups with itself, and it is placed first
    /// when it is missing from `all` (e.g. a stale selection after a refresh).
    #[must_use]
    pub fn group_at<'a>(
        &self,
        clicked: &'a VendingMachineRecord,
        all: &'a [VendingMachineRecord],
    ) -> Vec<&'a VendingMachineRecord> {
        let mut group: Vec<&VendingMachineRecord> = all
            .iter()
            .filter(|candidate| candidate.id == clicked.id || self.co_located(candidate, clicked))
            .collect();

        if !group.iter().any(|m| m.id == clicked.id) {
            group.insert(0, clicked);
        }
        group
    }

    /// Partition the whole list into co-location clusters.
    ///
    /// Greedy and order-dependent: each machine not yet assigned seeds a
    /// cluster of the unassigned machines within tolerance of it. Clusters and
    /// their members both keep store order.
    #[must_use]
    pub fn clusters<'a>(
        &self,
        all: &'a [VendingMachineRecord],
    ) -> Vec<Vec<&'a VendingMachineRecord>> {
        let mut assigned = vec![false; all.len()];
        let mut clusters = Vec::new();

        for (seed_idx, seed) in all.iter().enumerate() {
            if assigned[seed_idx] {
                continue;
            }
            let mut cluster = Vec::new();
            for (idx, candidate) in all.iter().enumerate().skip(seed_idx) {
                if !assigned[idx] && (idx == seed_idx || self.co_located(seed, candidate)) {
                    assigned[idx] = true;
                    cluster.push(candidate);
                }
            }
            clusters.push(cluster);
        }
        clusters
    }
}
