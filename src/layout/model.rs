//! Geometry model for truck side layouts.
//!
//! All internal arithmetic is in centimeters. Meters only appear in
//! [`LayoutSnapshot`], the shape exchanged with the persistence collaborator.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::segments::segments;
use crate::error::{LayoutError, LayoutResult};

// =============================================================================
// BOUNDS AND DEFAULTS
// =============================================================================

/// Default height of the left/right flanks (cm).
pub const DEFAULT_FLANK_HEIGHT: f64 = 240.0;
/// Default width of the left/right flanks (cm).
pub const DEFAULT_FLANK_WIDTH: f64 = 800.0;
/// Default height of the rear side (cm).
pub const DEFAULT_BACK_HEIGHT: f64 = 242.0;
/// Default width of the rear side (cm).
pub const DEFAULT_BACK_WIDTH: f64 = 242.0;

pub const MIN_SIDE_HEIGHT: f64 = 100.0;
pub const MAX_SIDE_HEIGHT: f64 = 400.0;
pub const MIN_TOTAL_WIDTH: f64 = 100.0;
pub const MIN_DOOR_HEIGHT: f64 = 50.0;
pub const MIN_DOOR_WIDTH: f64 = 10.0;

/// Width given to a newly added door (cm).
pub const DEFAULT_DOOR_WIDTH: f64 = 100.0;
/// Opening height given to a newly added door, measured from the bottom (cm).
pub const DEFAULT_DOOR_HEIGHT: f64 = 190.0;

// =============================================================================
// SIDE
// =============================================================================

/// One of the three vehicle panels being laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Driver side.
    Left,
    /// Passenger side.
    Right,
    /// Rear.
    Back,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Left, Side::Right, Side::Back];

    /// Wire name of the side.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Back => "back",
        }
    }

    /// Name used on drawings and exported file names.
    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "Motorista",
            Side::Right => "Sapo",
            Side::Back => "Traseira",
        }
    }

    /// The flank sharing this side's height, if any.
    pub fn partner(&self) -> Option<Side> {
        match self {
            Side::Left => Some(Side::Right),
            Side::Right => Some(Side::Left),
            Side::Back => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
            Side::Back => 2,
        }
    }

    /// State a side starts with when nothing has been persisted for it.
    pub fn default_state(&self) -> SideState {
        match self {
            Side::Left | Side::Right => SideState::new(DEFAULT_FLANK_HEIGHT, DEFAULT_FLANK_WIDTH),
            Side::Back => SideState::new(DEFAULT_BACK_HEIGHT, DEFAULT_BACK_WIDTH),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = LayoutError;

    fn from_str(s: &str) -> LayoutResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            "back" => Ok(Side::Back),
            _ => Err(LayoutError::invalid_side(s)),
        }
    }
}

/// Fixed-size collection holding one value per [`Side`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerSide<T>([T; 3]);

impl<T> PerSide<T> {
    /// Builds the collection by calling `f` once per side.
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self([f(Side::Left), f(Side::Right), f(Side::Back)])
    }

    /// Iterates `(side, value)` pairs in left, right, back order.
    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        Side::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        &self.0[side.index()]
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        &mut self.0[side.index()]
    }
}

// =============================================================================
// DOOR
// =============================================================================

/// A door opening on a side.
///
/// `position` is the offset of the left edge from the side's left edge.
/// `door_height` is measured from the bottom of the layout upward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub id: String,
    pub position: f64,
    pub width: f64,
    pub door_height: f64,
}

impl Door {
    /// Creates a door with a freshly generated identity.
    pub fn new(position: f64, width: f64, door_height: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            position,
            width,
            door_height,
        }
    }

    /// Right edge of the opening.
    pub fn end(&self) -> f64 {
        self.position + self.width
    }

    /// Returns true if the two openings share any horizontal extent.
    pub fn overlaps(&self, other: &Door) -> bool {
        self.position < other.end() && other.position < self.end()
    }

    /// Same geometry under a new identity.
    pub fn with_fresh_id(&self) -> Self {
        Self::new(self.position, self.width, self.door_height)
    }
}

// =============================================================================
// SEGMENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Panel,
    Door,
}

/// A derived contiguous interval of a side. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub door: Option<Door>,
}

impl Segment {
    pub(crate) fn panel(start: f64, end: f64) -> Self {
        Self {
            kind: SegmentKind::Panel,
            start,
            end,
            width: end - start,
            door: None,
        }
    }

    pub(crate) fn door(door: &Door) -> Self {
        Self {
            kind: SegmentKind::Door,
            start: door.position,
            end: door.end(),
            width: door.width,
            door: Some(door.clone()),
        }
    }

    pub fn is_panel(&self) -> bool {
        self.kind == SegmentKind::Panel
    }

    pub fn is_door(&self) -> bool {
        self.kind == SegmentKind::Door
    }
}

// =============================================================================
// SIDE STATE
// =============================================================================

/// Editable state of one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideState {
    pub height: f64,
    pub total_width: f64,
    pub doors: Vec<Door>,
}

impl SideState {
    /// Creates a side with no doors.
    pub fn new(height: f64, total_width: f64) -> Self {
        Self {
            height,
            total_width,
            doors: Vec::new(),
        }
    }

    /// Builder: Add a door.
    pub fn with_door(mut self, door: Door) -> Self {
        self.doors.push(door);
        self
    }

    /// Derives the panel/door segments tiling this side.
    pub fn segments(&self) -> Vec<Segment> {
        segments(&self.doors, self.total_width)
    }

    /// Doors ordered left to right.
    pub fn sorted_doors(&self) -> Vec<&Door> {
        let mut doors: Vec<&Door> = self.doors.iter().collect();
        doors.sort_by(|a, b| a.position.total_cmp(&b.position));
        doors
    }

    /// Gets a door by ID.
    pub fn door(&self, id: &str) -> Option<&Door> {
        self.doors.iter().find(|d| d.id == id)
    }

    pub(crate) fn door_mut(&mut self, id: &str) -> LayoutResult<&mut Door> {
        self.doors
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| LayoutError::door_not_found(id))
    }

    /// Right edge of the rightmost door, or 0 without doors.
    pub fn doors_end(&self) -> f64 {
        self.doors.iter().map(Door::end).fold(0.0, f64::max)
    }

    /// Converts to the meter-based persisted shape.
    pub fn to_snapshot(&self) -> LayoutSnapshot {
        let layout_sections = self
            .segments()
            .iter()
            .enumerate()
            .map(|(index, segment)| LayoutSection {
                width: cm_to_m(segment.width),
                is_door: segment.is_door(),
                door_height: segment.door.as_ref().map(|d| cm_to_m(d.door_height)),
                position: index as u32,
            })
            .collect();
        LayoutSnapshot {
            height: cm_to_m(self.height),
            layout_sections: Some(layout_sections),
            photo_id: None,
            photo_file: None,
        }
    }

    /// Rebuilds a side from a persisted snapshot.
    ///
    /// Returns None when the snapshot carries no sections. Values are clamped
    /// to the side bounds; door identities are freshly generated.
    pub fn from_snapshot(side: Side, snapshot: &LayoutSnapshot) -> Option<Self> {
        let sections = snapshot.layout_sections.as_ref()?;
        let height = m_to_cm(snapshot.height).clamp(MIN_SIDE_HEIGHT, MAX_SIDE_HEIGHT);
        if sections.is_empty() {
            return Some(SideState {
                height,
                ..side.default_state()
            });
        }

        let mut ordered: Vec<&LayoutSection> = sections.iter().collect();
        ordered.sort_by_key(|s| s.position);

        let mut offset = 0.0;
        let mut doors = Vec::new();
        for section in ordered {
            let width = m_to_cm(section.width).max(0.0);
            if section.is_door && width > 0.0 {
                let door_height = section
                    .door_height
                    .map(m_to_cm)
                    .unwrap_or(DEFAULT_DOOR_HEIGHT)
                    .clamp(MIN_DOOR_HEIGHT, height);
                doors.push(Door::new(offset, width, door_height));
            }
            offset += width;
        }

        Some(SideState {
            height,
            total_width: offset.max(MIN_TOTAL_WIDTH),
            doors,
        })
    }
}

// =============================================================================
// PERSISTED SNAPSHOT
// =============================================================================

/// One section of a persisted layout, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSection {
    pub width: f64,
    pub is_door: bool,
    #[serde(default)]
    pub door_height: Option<f64>,
    /// Ordinal of the section, left to right.
    pub position: u32,
}

/// The persisted shape exchanged with the collaborator.
///
/// `layout_sections == None` marks an incomplete payload, not a deletion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub height: f64,
    #[serde(default)]
    pub layout_sections: Option<Vec<LayoutSection>>,
    #[serde(default)]
    pub photo_id: Option<String>,
    /// Locally selected photo awaiting upload. Never serialized.
    #[serde(skip)]
    pub photo_file: Option<PhotoFile>,
}

impl LayoutSnapshot {
    /// Builder: Set photo ID.
    pub fn with_photo_id(mut self, photo_id: impl Into<String>) -> Self {
        self.photo_id = Some(photo_id.into());
        self
    }

    /// Returns true if the payload can be applied.
    pub fn is_complete(&self) -> bool {
        self.layout_sections.is_some()
    }
}

/// Outbound change handed to the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutChange {
    pub side: Side,
    /// Local edit counter at the time the change was emitted.
    pub version: u64,
    pub snapshot: LayoutSnapshot,
}

/// Inbound snapshot delivered by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingSnapshot {
    pub snapshot: LayoutSnapshot,
    /// Highest local version the collaborator had persisted when it read
    /// this snapshot. None for collaborators that do not track versions.
    #[serde(default)]
    pub acknowledged_version: Option<u64>,
}

impl IncomingSnapshot {
    pub fn unversioned(snapshot: LayoutSnapshot) -> Self {
        Self {
            snapshot,
            acknowledged_version: None,
        }
    }

    pub fn versioned(snapshot: LayoutSnapshot, acknowledged_version: u64) -> Self {
        Self {
            snapshot,
            acknowledged_version: Some(acknowledged_version),
        }
    }
}

// =============================================================================
// PHOTO
// =============================================================================

/// A photo file chosen locally for the rear side.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Inline `data:` URL for previewing the file before upload.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for PhotoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Rear photo attachment. A local file wins over a persisted `photo_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoState {
    pub image_url: Option<String>,
    pub photo_id: Option<String>,
    #[serde(skip)]
    pub file: Option<PhotoFile>,
}

impl PhotoState {
    pub fn has_local_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.photo_id.is_none() && self.file.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// UNITS
// =============================================================================

/// Centimeters to meters with two-decimal precision.
pub fn cm_to_m(cm: f64) -> f64 {
    cm.round() / 100.0
}

/// Meters to whole centimeters. Non-finite input yields 0.
pub fn m_to_cm(m: f64) -> f64 {
    round_cm(m * 100.0)
}

/// Rounds to whole centimeters. NaN and infinities become 0, so every
/// subsequent clamp sees a real number.
pub(crate) fn round_cm(value: f64) -> f64 {
    if value.is_finite() {
        value.round()
    } else {
        0.0
    }
}

/// Parses a measure typed by the user. Malformed input yields 0.
pub fn parse_measure(input: &str) -> f64 {
    input
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// =============================================================================
// TESTS
// =============================================================================
