//! Copy and mirror of one side's layout onto another.
//!
//! Both produce fully independent states: every door gets a new identity.

use serde::{Deserialize, Serialize};

use super::model::{Door, SideState};

/// How a source layout is carried onto a target side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    /// Same positions as the source.
    Copy,
    /// Reflected about the vertical centerline.
    Mirror,
}

/// Clones height, width and doors with fresh door IDs.
pub fn copy_state(source: &SideState) -> SideState {
    SideState {
        height: source.height,
        total_width: source.total_width,
        doors: source.doors.iter().map(Door::with_fresh_id).collect(),
    }
}

/// Reflects every door: `position' = total_width - (position + width)`.
pub fn mirror_state(source: &SideState) -> SideState {
    let total = source.total_width;
    SideState {
        height: source.height,
        total_width: total,
        doors: source
            .doors
            .iter()
            .map(|door| Door::new((total - door.end()).max(0.0), door.width, door.door_height))
            .collect(),
    }
}

/// Applies the requested transfer.
pub fn transfer_state(source: &SideState, transfer: Transfer) -> SideState {
    match transfer {
        Transfer::Copy => copy_state(source),
        Transfer::Mirror => mirror_state(source),
    }
}
