//! Error types for the side layout engine.

use thiserror::Error;

/// Result type alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Errors that can occur while editing, persisting or exporting a layout.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Automerge error during store operations.
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// Autosurgeon hydration error.
    #[error("Hydration error: {0}")]
    Hydrate(#[from] autosurgeon::HydrateError),

    /// Autosurgeon reconcile error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] autosurgeon::ReconcileError),

    /// Door not found on the addressed side.
    #[error("Door not found: {0}")]
    DoorNotFound(String),

    /// Segment index out of bounds for the derived segment list.
    #[error("Segment {index} out of bounds for {length} segments")]
    SegmentOutOfRange { index: usize, length: usize },

    /// No gap on the side is wide enough for a new door.
    #[error("No gap wide enough for a {width}cm door")]
    NoRoomForDoor { width: f64 },

    /// Unknown side name.
    #[error("Invalid side: {0}")]
    InvalidSide(String),

    /// Copy/mirror source and target are the same side.
    #[error("Source and target side are both '{0}'")]
    SameSide(String),

    /// The collaborator rejected or failed to persist a change.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Drawing export failed.
    #[error("Export error: {0}")]
    Export(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LayoutError {
    /// Creates a DoorNotFound error.
    pub fn door_not_found(id: impl Into<String>) -> Self {
        Self::DoorNotFound(id.into())
    }

    /// Creates a SegmentOutOfRange error.
    pub fn segment_out_of_range(index: usize, length: usize) -> Self {
        Self::SegmentOutOfRange { index, length }
    }

    /// Creates a NoRoomForDoor error.
    pub fn no_room_for_door(width: f64) -> Self {
        Self::NoRoomForDoor { width }
    }

    /// Creates an InvalidSide error.
    pub fn invalid_side(side: impl Into<String>) -> Self {
        Self::InvalidSide(side.into())
    }

    /// Creates a Sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Creates an Export error.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a Serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
