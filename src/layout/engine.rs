//! The layout engine: an explicit command interface over the three sides.
//!
//! Every command edits the active side through the planner, records the edit
//! with the [`SyncGuard`] and hands the resulting [`LayoutChange`] to the
//! [`LayoutSink`]. Snapshots from the collaborator go through
//! [`LayoutEngine::receive_snapshot`], which only applies them when the guard
//! admits them.
//!
//! # Example
//!
//! ```rust
//! use sidelayout::{LayoutChange, LayoutEngine, LayoutResult, SaveStatus, Side};
//!
//! let mut saved = Vec::new();
//! let mut engine = LayoutEngine::new(|change: &LayoutChange| -> LayoutResult<SaveStatus> {
//!     saved.push(change.side);
//!     Ok(SaveStatus::Settled)
//! });
//!
//! engine.select_side(Side::Left).unwrap();
//! let door = engine.add_door().unwrap();
//! assert_eq!(engine.state(Side::Left).door(&door).unwrap().position, 350.0);
//! drop(engine);
//! assert_eq!(saved, vec![Side::Left, Side::Left]);
//! ```

use tracing::{debug, warn};

use super::drawing::{self, ExportFile};
use super::model::{
    IncomingSnapshot, LayoutChange, LayoutSnapshot, PerSide, PhotoFile, PhotoState, Segment, Side,
    SideState,
};
use super::planner;
use super::sync::{fingerprint, Admission, Clock, SettledSave, SyncGuard, SyncState, SystemClock};
use super::transform::{transfer_state, Transfer};
use crate::config::EngineConfig;
use crate::error::{LayoutError, LayoutResult};

// =============================================================================
// SINK
// =============================================================================

/// How a sink reports the save of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Persisted (or accepted for batching) before returning.
    Settled,
    /// Persistence continues in the background; the caller reports the
    /// outcome later through [`LayoutEngine::save_settled`].
    InFlight,
}

/// The collaborator that receives every accepted local change.
pub trait LayoutSink {
    fn apply_change(&mut self, change: &LayoutChange) -> LayoutResult<SaveStatus>;
}

impl<F> LayoutSink for F
where
    F: FnMut(&LayoutChange) -> LayoutResult<SaveStatus>,
{
    fn apply_change(&mut self, change: &LayoutChange) -> LayoutResult<SaveStatus> {
        self(change)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Editor engine for the left, right and back layouts of a vehicle.
///
/// Call [`load_snapshots`](Self::load_snapshots) with whatever the
/// collaborator has persisted, then [`select_side`](Self::select_side) with
/// the side being shown.
pub struct LayoutEngine<S, C = SystemClock> {
    config: EngineConfig,
    sides: PerSide<SideState>,
    active: Side,
    photo: PhotoState,
    /// Local version at which the pending photo file was chosen.
    photo_file_version: Option<u64>,
    guard: SyncGuard,
    sink: S,
    clock: C,
    last_save_error: Option<String>,
}

impl<S: LayoutSink> LayoutEngine<S, SystemClock> {
    /// Creates an engine with default config and the system clock.
    pub fn new(sink: S) -> Self {
        Self::with_clock(sink, SystemClock, EngineConfig::default())
    }
}

impl<S: LayoutSink, C: Clock> LayoutEngine<S, C> {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    pub fn with_clock(sink: S, clock: C, config: EngineConfig) -> Self {
        Self {
            guard: SyncGuard::new(&config),
            config,
            sides: PerSide::from_fn(|side| side.default_state()),
            active: Side::Left,
            photo: PhotoState::default(),
            photo_file_version: None,
            sink,
            clock,
            last_save_error: None,
        }
    }

    /// Offers the collaborator's persisted snapshots, e.g. on mount.
    pub fn load_snapshots<I>(&mut self, snapshots: I) -> LayoutResult<Vec<(Side, Admission)>>
    where
        I: IntoIterator<Item = (Side, IncomingSnapshot)>,
    {
        snapshots
            .into_iter()
            .map(|(side, incoming)| Ok((side, self.receive_snapshot(side, incoming)?)))
            .collect()
    }

    /// Makes `side` the target of editing commands.
    ///
    /// The first time a side without a persisted snapshot is selected, its
    /// default state is emitted so the collaborator has a value for it.
    pub fn select_side(&mut self, side: Side) -> LayoutResult<()> {
        self.active = side;
        if self.guard.needs_initial_emission(side) {
            self.guard.mark_initial_emitted(side);
            debug!(%side, "emitting initial state");
            self.emit(side)?;
        }
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_side(&self) -> Side {
        self.active
    }

    pub fn state(&self, side: Side) -> &SideState {
        &self.sides[side]
    }

    pub fn active_state(&self) -> &SideState {
        &self.sides[self.active]
    }

    pub fn segments(&self, side: Side) -> Vec<Segment> {
        self.sides[side].segments()
    }

    pub fn photo(&self) -> &PhotoState {
        &self.photo
    }

    pub fn sync_state(&self, side: Side) -> SyncState {
        self.guard.state(side)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.guard.has_pending_changes()
    }

    pub fn is_saving(&self) -> bool {
        self.guard.is_saving(self.clock.now_ms())
    }

    pub fn local_version(&self) -> u64 {
        self.guard.local_version()
    }

    /// Message of the most recent failed save, cleared by the next success.
    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// The persisted shape of a side, including the rear photo.
    pub fn snapshot(&self, side: Side) -> LayoutSnapshot {
        let mut snapshot = self.sides[side].to_snapshot();
        if side == Side::Back {
            snapshot.photo_id = self.photo.photo_id.clone();
            snapshot.photo_file = self.photo.file.clone();
        }
        snapshot
    }

    // =========================================================================
    // DOOR COMMANDS
    // =========================================================================

    /// Adds a door with the configured default size. Returns its ID.
    pub fn add_door(&mut self) -> LayoutResult<String> {
        self.add_door_with(self.config.door_width, self.config.door_height)
    }

    pub fn add_door_with(&mut self, width: f64, door_height: f64) -> LayoutResult<String> {
        let side = self.active;
        let id = planner::add_door(&mut self.sides[side], width, door_height).map_err(|e| {
            warn!(%side, error = %e, "add door rejected");
            e
        })?;
        self.commit(&[side])?;
        Ok(id)
    }

    pub fn remove_door(&mut self, id: &str) -> LayoutResult<()> {
        let side = self.active;
        planner::remove_door(&mut self.sides[side], id)?;
        self.commit(&[side])
    }

    pub fn move_door(&mut self, id: &str, position: f64) -> LayoutResult<f64> {
        let side = self.active;
        let position = planner::move_door(&mut self.sides[side], id, position)?;
        self.commit(&[side])?;
        Ok(position)
    }

    pub fn resize_door(&mut self, id: &str, width: f64) -> LayoutResult<()> {
        let side = self.active;
        planner::resize_door(&mut self.sides[side], id, width)?;
        self.commit(&[side])
    }

    pub fn set_door_height(&mut self, id: &str, door_height: f64) -> LayoutResult<f64> {
        let side = self.active;
        let applied = planner::set_door_height(&mut self.sides[side], id, door_height)?;
        self.commit(&[side])?;
        Ok(applied)
    }

    // =========================================================================
    // DIMENSION COMMANDS
    // =========================================================================

    /// Resizes a segment of the active side by its index in [`segments`](Self::segments).
    pub fn resize_segment(&mut self, index: usize, width: f64) -> LayoutResult<()> {
        let side = self.active;
        planner::resize_segment(&mut self.sides[side], index, width)?;
        self.commit(&[side])
    }

    pub fn set_total_width(&mut self, width: f64) -> LayoutResult<f64> {
        let side = self.active;
        let applied = planner::set_total_width(&mut self.sides[side], width);
        self.commit(&[side])?;
        Ok(applied)
    }

    /// Sets the height of the active side. The left and right flanks share
    /// one height, so editing either changes (and emits) both.
    pub fn set_height(&mut self, height: f64) -> LayoutResult<f64> {
        let side = self.active;
        let applied = planner::set_height(&mut self.sides[side], height);
        match side.partner() {
            Some(partner) => {
                planner::set_height(&mut self.sides[partner], applied);
                self.commit(&[side, partner])?;
            }
            None => self.commit(&[side])?,
        }
        Ok(applied)
    }

    // =========================================================================
    // COPY / MIRROR
    // =========================================================================

    pub fn copy_side(&mut self, from: Side, to: Side) -> LayoutResult<()> {
        self.transfer(from, to, Transfer::Copy)
    }

    pub fn mirror_side(&mut self, from: Side, to: Side) -> LayoutResult<()> {
        self.transfer(from, to, Transfer::Mirror)
    }

    /// Replaces `to` with a copy or mirror image of `from`.
    pub fn transfer(&mut self, from: Side, to: Side, transfer: Transfer) -> LayoutResult<()> {
        if from == to {
            return Err(LayoutError::SameSide(from.to_string()));
        }
        let target = transfer_state(&self.sides[from], transfer);
        let height = target.height;
        self.sides[to] = target;

        let mut changed = vec![to];
        if let Some(partner) = to.partner() {
            if self.sides[partner].height != height {
                planner::set_height(&mut self.sides[partner], height);
                changed.push(partner);
            }
        }
        debug!(%from, %to, ?transfer, "side transferred");
        self.commit(&changed)
    }

    // =========================================================================
    // PHOTO
    // =========================================================================

    /// Attaches a locally chosen rear photo. It wins over any persisted
    /// photo until a save carrying it succeeds; a sink that settles
    /// synchronously takes it right away and only the preview URL remains.
    pub fn set_photo_file(&mut self, file: PhotoFile) -> LayoutResult<()> {
        self.photo.image_url = Some(file.data_url());
        self.photo.file = Some(file);
        let version = self.record(&[Side::Back]);
        self.photo_file_version = Some(version);
        self.emit_all(&[Side::Back])
    }

    /// Clears the rear photo entirely.
    pub fn remove_photo(&mut self) -> LayoutResult<()> {
        self.photo.clear();
        self.photo_file_version = None;
        self.commit(&[Side::Back])
    }

    // =========================================================================
    // EXPORT
    // =========================================================================

    pub fn export_svg(&self, side: Side) -> LayoutResult<String> {
        drawing::render_svg(side, &self.sides[side]).map_err(|e| {
            warn!(%side, error = %e, "drawing export failed");
            e
        })
    }

    /// Renders the side and names the file using the configured task prefix.
    pub fn export_file(&self, side: Side) -> LayoutResult<ExportFile> {
        drawing::export_file(side, &self.sides[side], self.config.task_prefix.as_deref()).map_err(
            |e| {
                warn!(%side, error = %e, "drawing export failed");
                e
            },
        )
    }

    // =========================================================================
    // SYNC
    // =========================================================================

    /// Offers a snapshot from the collaborator. It only replaces local state
    /// when the guard admits it; the decision is returned either way.
    pub fn receive_snapshot(&mut self, side: Side, incoming: IncomingSnapshot) -> LayoutResult<Admission> {
        let now = self.clock.now_ms();
        let fingerprint = fingerprint(side, &incoming.snapshot)?;
        let admission = self.guard.admit(side, &incoming, &fingerprint, now);
        debug!(%side, ?admission, "inbound snapshot");

        if admission.is_applied() {
            if let Some(state) = SideState::from_snapshot(side, &incoming.snapshot) {
                self.sides[side] = state;
            }
            // flanks share one height; the partner follows without emitting
            if let Some(partner) = side.partner() {
                let height = self.sides[side].height;
                if self.sides[partner].height != height {
                    planner::set_height(&mut self.sides[partner], height);
                    debug!(%side, %partner, height, "partner height follows inbound snapshot");
                }
            }
            if side == Side::Back {
                self.apply_photo(&incoming.snapshot);
            }
        }
        Ok(admission)
    }

    /// Reports the outcome of the oldest save the sink left in flight.
    pub fn save_settled(&mut self, result: LayoutResult<()>) -> Option<SettledSave> {
        let now = self.clock.now_ms();
        let settled = self.guard.settle_oldest(result.is_ok(), now)?;
        self.after_settle(settled, result.err());
        Some(settled)
    }

    /// Reports the outcome of the in-flight save of a specific change,
    /// identified by its side and version.
    pub fn settle_change(&mut self, side: Side, version: u64, result: LayoutResult<()>) -> Option<SettledSave> {
        let now = self.clock.now_ms();
        let settled = self.guard.settle_version(side, version, result.is_ok(), now)?;
        self.after_settle(settled, result.err());
        Some(settled)
    }

    fn apply_photo(&mut self, snapshot: &LayoutSnapshot) {
        if self.photo.has_local_file() {
            debug!("local photo pending, ignoring persisted photo");
            return;
        }
        self.photo.photo_id = snapshot.photo_id.clone();
        self.photo.image_url = snapshot
            .photo_id
            .as_deref()
            .and_then(|id| self.config.photo_url(id));
    }

    fn commit(&mut self, sides: &[Side]) -> LayoutResult<()> {
        self.record(sides);
        self.emit_all(sides)
    }

    /// Records an edit on every side and returns the resulting local version.
    fn record(&mut self, sides: &[Side]) -> u64 {
        let now = self.clock.now_ms();
        for &side in sides {
            self.guard.record_mutation(side, now);
        }
        self.guard.local_version()
    }

    fn emit_all(&mut self, sides: &[Side]) -> LayoutResult<()> {
        for &side in sides {
            self.emit(side)?;
        }
        Ok(())
    }

    fn emit(&mut self, side: Side) -> LayoutResult<()> {
        let snapshot = self.snapshot(side);
        let fingerprint = fingerprint(side, &snapshot)?;
        let change = LayoutChange {
            side,
            version: self.guard.local_version(),
            snapshot,
        };
        let ticket = self.guard.begin_save(side, change.version, fingerprint);
        debug!(%side, version = change.version, "emitting change");

        match self.sink.apply_change(&change) {
            Ok(SaveStatus::Settled) => {
                if let Some(settled) = self.guard.settle_save(ticket, true, false, self.clock.now_ms()) {
                    self.after_settle(settled, None);
                }
            }
            Ok(SaveStatus::InFlight) => {}
            Err(e) => {
                if let Some(settled) = self.guard.settle_save(ticket, false, false, self.clock.now_ms()) {
                    self.after_settle(settled, Some(e));
                }
            }
        }
        Ok(())
    }

    fn after_settle(&mut self, settled: SettledSave, error: Option<LayoutError>) {
        match error {
            Some(e) => {
                warn!(side = %settled.side, version = settled.version, error = %e, "save failed");
                self.last_save_error = Some(e.to_string());
            }
            None => {
                self.last_save_error = None;
                let submitted = settled.side == Side::Back
                    && self.photo_file_version.is_some_and(|v| settled.version >= v);
                if submitted {
                    self.photo.file = None;
                    self.photo_file_version = None;
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
