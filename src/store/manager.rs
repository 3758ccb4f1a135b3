//! `LayoutStore`: an Automerge document holding the persisted layout of every
//! side.
//!
//! The store is a ready-made [`LayoutSink`]: every change the engine emits is
//! reconciled into the document, and [`LayoutStore::snapshots`] hands the
//! persisted state back as versioned inbound snapshots.

use automerge::AutoCommit;
use autosurgeon::{hydrate, reconcile};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::model::{StoredLayout, StoredSide};
use crate::error::LayoutResult;
use crate::layout::engine::{LayoutSink, SaveStatus};
use crate::layout::model::{IncomingSnapshot, LayoutChange, PhotoFile, Side};

/// Collaborative document with the persisted snapshot of each side.
pub struct LayoutStore {
    doc: AutoCommit,
    /// Cached hydrated state - invalidated on load/merge.
    cached_state: Option<StoredLayout>,
}

impl LayoutStore {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates an empty store with an initialized document schema.
    pub fn new() -> LayoutResult<Self> {
        let mut doc = AutoCommit::new();
        let root = StoredLayout::default();
        reconcile(&mut doc, &root)?;
        Ok(Self {
            doc,
            cached_state: Some(root),
        })
    }

    /// Loads a store from saved binary data.
    pub fn from_bytes(bytes: &[u8]) -> LayoutResult<Self> {
        let doc = AutoCommit::load(bytes)?;
        Ok(Self {
            doc,
            cached_state: None,
        })
    }

    /// Saves the document to binary format.
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Merges another replica of the store into this one.
    pub fn merge(&mut self, other: &mut Self) -> LayoutResult<()> {
        self.cached_state = None;
        self.doc.merge(&mut other.doc)?;
        Ok(())
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn get_state(&mut self) -> LayoutResult<StoredLayout> {
        if let Some(ref cached) = self.cached_state {
            return Ok(cached.clone());
        }
        let state: StoredLayout = hydrate(&self.doc)?;
        self.cached_state = Some(state.clone());
        Ok(state)
    }

    /// Applies a function to mutate the state, then reconciles back to the document.
    pub fn update_state<F>(&mut self, f: F) -> LayoutResult<()>
    where
        F: FnOnce(&mut StoredLayout),
    {
        let mut state = self.get_state()?;
        f(&mut state);
        reconcile(&mut self.doc, &state)?;
        self.cached_state = Some(state);
        Ok(())
    }

    /// Highest engine version persisted.
    pub fn version(&mut self) -> LayoutResult<u64> {
        Ok(self.get_state()?.version)
    }

    // =========================================================================
    // SIDES
    // =========================================================================

    /// Persists a change. A pending photo file is replaced by its photo ID.
    pub fn put_change(&mut self, change: &LayoutChange) -> LayoutResult<()> {
        let mut side = StoredSide::from_snapshot(&change.snapshot, change.version);
        if let Some(file) = &change.snapshot.photo_file {
            side.photo_id = Some(photo_id(file));
        }
        self.update_state(|state| {
            state.version = state.version.max(change.version);
            state.sides.insert(change.side.to_string(), side);
        })
    }

    /// Gets the persisted snapshot of a side, versioned with the store's version.
    pub fn snapshot(&mut self, side: Side) -> LayoutResult<Option<IncomingSnapshot>> {
        let state = self.get_state()?;
        Ok(state
            .sides
            .get(side.as_str())
            .map(|stored| IncomingSnapshot::versioned(stored.to_snapshot(), state.version)))
    }

    /// Gets every persisted side, in left, right, back order.
    pub fn snapshots(&mut self) -> LayoutResult<Vec<(Side, IncomingSnapshot)>> {
        let mut snapshots = Vec::new();
        for side in Side::ALL {
            if let Some(snapshot) = self.snapshot(side)? {
                snapshots.push((side, snapshot));
            }
        }
        Ok(snapshots)
    }
}

impl LayoutSink for LayoutStore {
    fn apply_change(&mut self, change: &LayoutChange) -> LayoutResult<SaveStatus> {
        self.put_change(change)?;
        debug!(side = %change.side, version = change.version, "change stored");
        Ok(SaveStatus::Settled)
    }
}

/// Content-addressed ID for an uploaded photo.
fn photo_id(file: &PhotoFile) -> String {
    let digest = Sha256::digest(&file.bytes);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::layout::engine::LayoutEngine;
    use crate::layout::model::SideState;
    use crate::layout::sync::{Admission, ManualClock};

    fn change(side: Side, version: u64, state: &SideState) -> LayoutChange {
        LayoutChange {
            side,
            version,
            snapshot: state.to_snapshot(),
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let mut store = LayoutStore::new().unwrap();
        assert!(store.snapshots().unwrap().is_empty());
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn test_put_and_save_load() {
        let mut store = LayoutStore::new().unwrap();
        let state = SideState::new(250.0, 700.0);
        store.put_change(&change(Side::Right, 3, &state)).unwrap();
        store.put_change(&change(Side::Back, 2, &Side::Back.default_state())).unwrap();

        let bytes = store.save();
        let mut loaded = LayoutStore::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.version().unwrap(), 3);

        let right = loaded.snapshot(Side::Right).unwrap().unwrap();
        assert_eq!(right.acknowledged_version, Some(3));
        assert_eq!(right.snapshot, state.to_snapshot());
        assert!(loaded.snapshot(Side::Left).unwrap().is_none());

        let sides: Vec<Side> = loaded.snapshots().unwrap().into_iter().map(|(s, _)| s).collect();
        assert_eq!(sides, vec![Side::Right, Side::Back]);
    }

    #[test]
    fn test_photo_file_becomes_photo_id() {
        let mut store = LayoutStore::new().unwrap();
        let mut change = change(Side::Back, 1, &Side::Back.default_state());
        change.snapshot.photo_file = Some(PhotoFile::new("rear.jpg", "image/jpeg", vec![1, 2, 3]));
        store.apply_change(&change).unwrap();

        let back = store.snapshot(Side::Back).unwrap().unwrap();
        let id = back.snapshot.photo_id.unwrap();
        assert_eq!(id.len(), 16);
        assert!(back.snapshot.photo_file.is_none());
    }

    #[test]
    fn test_merge_replicas() {
        let mut a = LayoutStore::new().unwrap();
        let mut b = LayoutStore::from_bytes(&a.save()).unwrap();
        a.put_change(&change(Side::Left, 1, &SideState::new(240.0, 800.0))).unwrap();
        b.put_change(&change(Side::Back, 4, &Side::Back.default_state())).unwrap();

        a.merge(&mut b).unwrap();
        assert!(a.snapshot(Side::Left).unwrap().is_some());
        assert!(a.snapshot(Side::Back).unwrap().is_some());
    }

    #[test]
    fn test_engine_round_trip_through_store() {
        let clock = ManualClock::new(0);
        let mut engine =
            LayoutEngine::with_clock(LayoutStore::new().unwrap(), clock.clone(), EngineConfig::default());
        engine.select_side(Side::Left).unwrap();
        engine.add_door().unwrap();
        engine.add_door().unwrap();
        let bytes = engine.sink_mut().save();

        // a fresh session restores the persisted layout
        let mut store = LayoutStore::from_bytes(&bytes).unwrap();
        let snapshots = store.snapshots().unwrap();
        let mut restored = LayoutEngine::with_clock(store, clock, EngineConfig::default());
        let admissions = restored.load_snapshots(snapshots).unwrap();
        assert_eq!(admissions, vec![(Side::Left, Admission::Applied)]);

        let positions: Vec<f64> = restored
            .state(Side::Left)
            .sorted_doors()
            .iter()
            .map(|d| d.position)
            .collect();
        assert_eq!(positions, vec![217.0, 483.0]);

        // selecting a side that was already persisted emits nothing
        restored.select_side(Side::Left).unwrap();
        assert!(!restored.has_pending_changes());
    }
}
