//! Input structs for parsing exported layout JSON.
//!
//! The file holds one optional snapshot per side, in the same meter-based
//! shape the engine persists:
//!
//! ```json
//! {
//!   "left":  { "height": 2.4, "layoutSections": [{ "width": 8.0, "isDoor": false, "position": 0 }] },
//!   "back":  { "height": 2.42, "layoutSections": [], "photoId": "abc" }
//! }
//! ```

use serde::Deserialize;

use sidelayout::{LayoutSnapshot, Side, SideState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InputLayout {
    pub left: Option<LayoutSnapshot>,
    pub right: Option<LayoutSnapshot>,
    pub back: Option<LayoutSnapshot>,
}

impl InputLayout {
    /// Normalized snapshots of the sides present in the file.
    ///
    /// Each snapshot is rebuilt through [`SideState`] so bounds are clamped
    /// and section positions renumbered. Sides without `layoutSections` are
    /// skipped.
    pub fn snapshots(&self) -> Vec<(Side, LayoutSnapshot)> {
        [(Side::Left, &self.left), (Side::Right, &self.right), (Side::Back, &self.back)]
            .into_iter()
            .filter_map(|(side, snapshot)| {
                let snapshot = snapshot.as_ref()?;
                let state = SideState::from_snapshot(side, snapshot)?;
                let mut normalized = state.to_snapshot();
                normalized.photo_id = snapshot.photo_id.clone();
                Some((side, normalized))
            })
            .collect()
    }
}
