//! Persisted shapes of the layout store.
//!
//! These structs use autosurgeon derives for automatic CRDT serialization.
//! They mirror [`LayoutSnapshot`] without the transient photo file.

use autosurgeon::{Hydrate, Reconcile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::layout::model::{LayoutSection, LayoutSnapshot};

// =============================================================================
// DOCUMENT ROOT
// =============================================================================

/// Root of the store document.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
pub struct StoredLayout {
    /// Highest engine version persisted so far.
    pub version: u64,

    /// Side name ("left", "right", "back") -> persisted side.
    pub sides: HashMap<String, StoredSide>,
}

// =============================================================================
// SIDE
// =============================================================================

#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
pub struct StoredSide {
    /// Meters.
    pub height: f64,
    pub layout_sections: Vec<StoredSection>,
    pub photo_id: Option<String>,
    /// Engine version of the change that last wrote this side.
    pub version: u64,
}

impl StoredSide {
    pub fn from_snapshot(snapshot: &LayoutSnapshot, version: u64) -> Self {
        Self {
            height: snapshot.height,
            layout_sections: snapshot
                .layout_sections
                .iter()
                .flatten()
                .map(StoredSection::from)
                .collect(),
            photo_id: snapshot.photo_id.clone(),
            version,
        }
    }

    pub fn to_snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            height: self.height,
            layout_sections: Some(self.layout_sections.iter().map(LayoutSection::from).collect()),
            photo_id: self.photo_id.clone(),
            photo_file: None,
        }
    }
}

#[derive(Debug, Clone, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
pub struct StoredSection {
    pub width: f64,
    pub is_door: bool,
    pub door_height: Option<f64>,
    pub position: u64,
}

impl From<&LayoutSection> for StoredSection {
    fn from(section: &LayoutSection) -> Self {
        Self {
            width: section.width,
            is_door: section.is_door,
            door_height: section.door_height,
            position: u64::from(section.position),
        }
    }
}

impl From<&StoredSection> for LayoutSection {
    fn from(section: &StoredSection) -> Self {
        Self {
            width: section.width,
            is_door: section.is_door,
            door_height: section.door_height,
            position: u32::try_from(section.position).unwrap_or(u32::MAX),
        }
    }
}
