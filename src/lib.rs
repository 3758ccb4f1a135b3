//! SideLayout - door and panel layout engine for truck body sides.
//!
//! Models the left, right and rear sides of a vehicle as a total width split
//! into panel and door segments, places new doors automatically, copies or
//! mirrors layouts between sides, exports SVG technical drawings and keeps
//! local edits safe from stale snapshots of a persistence collaborator.
//!
//! # Example
//!
//! ```rust
//! use sidelayout::{LayoutEngine, LayoutStore, Side};
//!
//! // The store persists every change into an Automerge document
//! let mut engine = LayoutEngine::new(LayoutStore::new().unwrap());
//!
//! engine.select_side(Side::Left).unwrap();
//! engine.add_door().unwrap();
//! engine.add_door().unwrap();
//! engine.mirror_side(Side::Left, Side::Right).unwrap();
//!
//! let positions: Vec<f64> = engine
//!     .state(Side::Right)
//!     .sorted_doors()
//!     .iter()
//!     .map(|door| door.position)
//!     .collect();
//! assert_eq!(positions, vec![217.0, 483.0]);
//!
//! let drawing = engine.export_file(Side::Right).unwrap();
//! assert_eq!(drawing.file_name, "sapo-layout-right-800mm.svg");
//!
//! // Save for sync
//! let bytes = engine.sink_mut().save();
//! assert!(!bytes.is_empty());
//! ```

pub mod config;
pub mod error;

// Layout module
pub mod layout;

// Store module
pub mod store;

// Re-exports for convenience
pub use config::EngineConfig;
pub use error::{LayoutError, LayoutResult};
pub use layout::{
    Admission, Door, ExportFile, IncomingSnapshot, LayoutChange, LayoutEngine, LayoutSink,
    LayoutSnapshot, PhotoFile, SaveStatus, Segment, Side, SideState, SyncState, Transfer,
};
pub use store::LayoutStore;

#[cfg(feature = "wasm")]
pub use layout::JsLayoutEngine;
