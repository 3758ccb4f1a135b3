//! Layout store module.
//!
//! Provides an Automerge-backed collaborator that persists the snapshot of
//! every side and can be shared between replicas.

pub mod manager;
pub mod model;

pub use manager::LayoutStore;
pub use model::{StoredLayout, StoredSection, StoredSide};
