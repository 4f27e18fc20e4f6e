use crate::detector::DetectionSettings;
use crate::roi::RegionOfInterest;
use std::sync::{Arc, PoisonError, RwLock};

/// Everything a detection cycle reads from operator configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InspectionSnapshot {
    pub roi: RegionOfInterest,
    pub settings: DetectionSettings,
}

/// Whole-value swap cell for [`InspectionSnapshot`].
///
/// Readers clone the `Arc` once per cycle, so an update lands either
/// entirely before or entirely after a cycle.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<InspectionSnapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: InspectionSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn load(&self) -> Arc<InspectionSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Derive the next snapshot from the current one under the write lock,
    /// so concurrent updates of different fields are not lost.
    pub fn update(&self, f: impl FnOnce(&InspectionSnapshot) -> InspectionSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_snapshot_is_unaffected_by_later_updates() {
        let cell = SnapshotCell::default();
        let before = cell.load();
        cell.update(|s| InspectionSnapshot {
            roi: RegionOfInterest::from_corners([0, 0], [10, 10]),
            settings: s.settings.clone(),
        });
        assert!(before.roi.is_none());
        assert!(!cell.load().roi.is_none());
    }
}
