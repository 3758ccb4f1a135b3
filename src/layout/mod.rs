//! Side layout module.
//!
//! Geometry model, segment calculator, door planner, copy/mirror, drawing
//! export, sync guard and the engine composing them.

pub mod drawing;
pub mod engine;
pub mod model;
pub mod planner;
pub mod segments;
pub mod sync;
pub mod transform;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use drawing::{render_svg, ExportFile};
pub use engine::{LayoutEngine, LayoutSink, SaveStatus};
pub use model::{
    parse_measure, Door, IncomingSnapshot, LayoutChange, LayoutSection, LayoutSnapshot, PerSide,
    PhotoFile, PhotoState, Segment, SegmentKind, Side, SideState,
};
pub use sync::{Admission, Clock, ManualClock, SyncGuard, SyncState, SystemClock};
pub use transform::Transfer;

#[cfg(feature = "wasm")]
pub use wasm::JsLayoutEngine;
