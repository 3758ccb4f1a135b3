//! Sync guard: decides when a snapshot from the collaborator may overwrite
//! local state, and tracks the saves handed to it.
//!
//! Inbound snapshots are checked in this order:
//!
//! 1. `layout_sections` missing: incomplete payload, ignored.
//! 2. A save is in flight or inside its grace period.
//! 3. The snapshot acknowledges an older local version than the current one.
//! 4. Unversioned snapshots inside the protection window after a local edit.
//! 5. The exact payload was already applied, or was the last one emitted,
//!    for that side.
//!
//! Anything that passes is applied and clears the pending-changes flag.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::model::{IncomingSnapshot, LayoutSnapshot, PerSide, Side};
use crate::config::EngineConfig;
use crate::error::LayoutResult;

// =============================================================================
// CLOCK
// =============================================================================

/// Source of wall-clock milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the Unix epoch from the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

// =============================================================================
// STATES AND DECISIONS
// =============================================================================

/// Per-side synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Neither a snapshot nor a default has been established.
    #[default]
    Uninitialized,
    /// Local state matches what the collaborator holds.
    Synced,
    /// Local edits not yet confirmed.
    LocallyDirty,
}

/// Outcome of offering an inbound snapshot to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Admission {
    Applied,
    Incomplete,
    Saving,
    Stale { acknowledged: u64, local: u64 },
    ProtectionWindow { remaining_ms: u64 },
    Duplicate,
}

impl Admission {
    pub fn is_applied(&self) -> bool {
        matches!(self, Admission::Applied)
    }
}

/// A save that has settled, as reported back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledSave {
    pub side: Side,
    pub version: u64,
    pub ok: bool,
}

/// Content fingerprint of a snapshot for a side (hex SHA-256).
pub fn fingerprint(side: Side, snapshot: &LayoutSnapshot) -> LayoutResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(side.as_str().as_bytes());
    hasher.update(serde_json::to_vec(snapshot)?);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Default)]
struct SideSync {
    state: SyncState,
    /// Version of the last local mutation on this side.
    dirty_version: u64,
    /// Last inbound payload applied to this side.
    applied_fingerprint: Option<String>,
    /// Last payload handed to the sink for this side.
    emitted_fingerprint: Option<String>,
    initial_emitted: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlightSave {
    ticket: u64,
    side: Side,
    version: u64,
}

// =============================================================================
// GUARD
// =============================================================================

#[derive(Debug, Clone)]
pub struct SyncGuard {
    protection_window_ms: u64,
    save_grace_ms: u64,
    pending_changes: bool,
    last_interaction_ms: Option<u64>,
    local_version: u64,
    acknowledged_version: u64,
    next_ticket: u64,
    in_flight: VecDeque<InFlightSave>,
    saving_until_ms: Option<u64>,
    sides: PerSide<SideSync>,
}

impl SyncGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            protection_window_ms: config.protection_window_ms,
            save_grace_ms: config.save_grace_ms,
            pending_changes: false,
            last_interaction_ms: None,
            local_version: 0,
            acknowledged_version: 0,
            next_ticket: 0,
            in_flight: VecDeque::new(),
            saving_until_ms: None,
            sides: PerSide::default(),
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_changes
    }

    pub fn local_version(&self) -> u64 {
        self.local_version
    }

    pub fn acknowledged_version(&self) -> u64 {
        self.acknowledged_version
    }

    pub fn last_interaction_ms(&self) -> Option<u64> {
        self.last_interaction_ms
    }

    pub fn state(&self, side: Side) -> SyncState {
        self.sides[side].state
    }

    /// True while a save is outstanding or inside its grace period.
    pub fn is_saving(&self, now_ms: u64) -> bool {
        !self.in_flight.is_empty() || self.saving_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Records a local edit on `side` and returns the new local version.
    pub fn record_mutation(&mut self, side: Side, now_ms: u64) -> u64 {
        self.pending_changes = true;
        self.last_interaction_ms = Some(now_ms);
        self.local_version += 1;
        let entry = &mut self.sides[side];
        entry.state = SyncState::LocallyDirty;
        entry.dirty_version = self.local_version;
        self.local_version
    }

    /// True the first time a side without a persisted snapshot is shown.
    pub fn needs_initial_emission(&self, side: Side) -> bool {
        let entry = &self.sides[side];
        entry.state == SyncState::Uninitialized && !entry.initial_emitted
    }

    /// Marks the side as established from its default state.
    pub fn mark_initial_emitted(&mut self, side: Side) {
        let entry = &mut self.sides[side];
        entry.initial_emitted = true;
        entry.state = SyncState::Synced;
    }

    /// Raises the saving flag for an outbound change and returns its ticket.
    ///
    /// The emitted payload's fingerprint is remembered next to the last
    /// applied one, so neither the collaborator echoing it back nor a
    /// redelivery of the previously applied payload resets the side.
    pub fn begin_save(&mut self, side: Side, version: u64, fingerprint: String) -> u64 {
        self.next_ticket += 1;
        self.in_flight.push_back(InFlightSave {
            ticket: self.next_ticket,
            side,
            version,
        });
        self.sides[side].emitted_fingerprint = Some(fingerprint);
        self.next_ticket
    }

    /// Settles the save with `ticket`. With `grace`, the saving flag stays up
    /// for the configured grace period after `now_ms`.
    pub fn settle_save(&mut self, ticket: u64, ok: bool, grace: bool, now_ms: u64) -> Option<SettledSave> {
        let index = self.in_flight.iter().position(|s| s.ticket == ticket)?;
        let save = self.in_flight.remove(index)?;
        Some(self.finish_save(save, ok, grace, now_ms))
    }

    /// Settles the oldest outstanding save.
    pub fn settle_oldest(&mut self, ok: bool, now_ms: u64) -> Option<SettledSave> {
        let save = self.in_flight.pop_front()?;
        Some(self.finish_save(save, ok, true, now_ms))
    }

    /// Settles the oldest outstanding save of `version` on `side`, with the
    /// grace period. Used when the sink's own completion reports back.
    pub fn settle_version(&mut self, side: Side, version: u64, ok: bool, now_ms: u64) -> Option<SettledSave> {
        let index = self
            .in_flight
            .iter()
            .position(|s| s.side == side && s.version == version)?;
        let save = self.in_flight.remove(index)?;
        Some(self.finish_save(save, ok, true, now_ms))
    }

    fn finish_save(&mut self, save: InFlightSave, ok: bool, grace: bool, now_ms: u64) -> SettledSave {
        if grace {
            let until = now_ms + self.save_grace_ms;
            self.saving_until_ms = Some(self.saving_until_ms.map_or(until, |u| u.max(until)));
        }
        let entry = &mut self.sides[save.side];
        if ok {
            self.acknowledged_version = self.acknowledged_version.max(save.version);
            if save.version >= entry.dirty_version {
                entry.state = SyncState::Synced;
            }
        } else {
            entry.emitted_fingerprint = None;
        }
        SettledSave {
            side: save.side,
            version: save.version,
            ok,
        }
    }

    /// Decides whether `incoming` may overwrite the local state of `side`.
    /// An `Applied` decision updates the guard as if the snapshot was applied.
    pub fn admit(
        &mut self,
        side: Side,
        incoming: &IncomingSnapshot,
        fingerprint: &str,
        now_ms: u64,
    ) -> Admission {
        if !incoming.snapshot.is_complete() {
            return Admission::Incomplete;
        }
        if self.is_saving(now_ms) {
            return Admission::Saving;
        }
        match incoming.acknowledged_version {
            Some(acknowledged) if acknowledged < self.local_version => {
                return Admission::Stale {
                    acknowledged,
                    local: self.local_version,
                };
            }
            Some(_) => {}
            None => {
                if let Some(last) = self.last_interaction_ms {
                    let elapsed = now_ms.saturating_sub(last);
                    if elapsed < self.protection_window_ms {
                        return Admission::ProtectionWindow {
                            remaining_ms: self.protection_window_ms - elapsed,
                        };
                    }
                }
            }
        }

        let entry = &mut self.sides[side];
        let seen = [&entry.applied_fingerprint, &entry.emitted_fingerprint]
            .into_iter()
            .any(|known| known.as_deref() == Some(fingerprint));
        if seen {
            return Admission::Duplicate;
        }

        entry.applied_fingerprint = Some(fingerprint.to_string());
        entry.state = SyncState::Synced;
        self.pending_changes = false;
        if let Some(acknowledged) = incoming.acknowledged_version {
            self.acknowledged_version = self.acknowledged_version.max(acknowledged);
        }
        Admission::Applied
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::SideState;

    fn guard() -> SyncGuard {
        SyncGuard::new(&EngineConfig::default())
    }

    fn incoming(width: f64) -> IncomingSnapshot {
        IncomingSnapshot::unversioned(SideState::new(240.0, width).to_snapshot())
    }

    fn offer(guard: &mut SyncGuard, side: Side, snap: &IncomingSnapshot, now: u64) -> Admission {
        let fp = fingerprint(side, &snap.snapshot).unwrap();
        guard.admit(side, snap, &fp, now)
    }

    #[test]
    fn test_clean_guard_admits() {
        let mut g = guard();
        assert_eq!(g.state(Side::Left), SyncState::Uninitialized);
        assert!(offer(&mut g, Side::Left, &incoming(800.0), 0).is_applied());
        assert_eq!(g.state(Side::Left), SyncState::Synced);
    }

    #[test]
    fn test_incomplete_rejected() {
        let mut g = guard();
        let snap = IncomingSnapshot::unversioned(LayoutSnapshot {
            height: 2.4,
            ..Default::default()
        });
        assert_eq!(offer(&mut g, Side::Left, &snap, 0), Admission::Incomplete);
    }

    #[test]
    fn test_protection_window() {
        let mut g = guard();
        g.record_mutation(Side::Left, 1_000);
        assert!(g.has_pending_changes());
        assert_eq!(
            offer(&mut g, Side::Left, &incoming(900.0), 5_999),
            Admission::ProtectionWindow { remaining_ms: 1 }
        );
        assert!(g.has_pending_changes());

        assert!(offer(&mut g, Side::Left, &incoming(900.0), 6_000).is_applied());
        assert!(!g.has_pending_changes());
    }

    #[test]
    fn test_window_applies_to_every_side() {
        let mut g = guard();
        g.record_mutation(Side::Back, 0);
        assert!(matches!(
            offer(&mut g, Side::Left, &incoming(900.0), 10),
            Admission::ProtectionWindow { .. }
        ));
    }

    #[test]
    fn test_duplicate_payload_not_reapplied() {
        let mut g = guard();
        let snap = incoming(800.0);
        assert!(offer(&mut g, Side::Right, &snap, 0).is_applied());
        assert_eq!(offer(&mut g, Side::Right, &snap, 10), Admission::Duplicate);
        // same payload on another side is a different fingerprint
        assert!(offer(&mut g, Side::Left, &snap, 10).is_applied());
    }

    #[test]
    fn test_saving_flag_and_grace() {
        let mut g = guard();
        let version = g.record_mutation(Side::Left, 0);
        let ticket = g.begin_save(Side::Left, version, "emitted".into());
        assert!(g.is_saving(10_000));
        assert_eq!(offer(&mut g, Side::Left, &incoming(900.0), 10_000), Admission::Saving);

        let settled = g.settle_save(ticket, true, true, 10_000).unwrap();
        assert_eq!(settled.version, version);
        assert_eq!(g.state(Side::Left), SyncState::Synced);
        assert!(g.is_saving(10_499));
        assert!(!g.is_saving(10_500));
        assert!(offer(&mut g, Side::Left, &incoming(900.0), 10_500).is_applied());
    }

    #[test]
    fn test_synchronous_settle_has_no_grace() {
        let mut g = guard();
        let ticket = g.begin_save(Side::Back, 0, "fp".into());
        g.settle_save(ticket, true, false, 100).unwrap();
        assert!(!g.is_saving(100));
    }

    #[test]
    fn test_emitted_payload_echo_is_duplicate() {
        let mut g = guard();
        let snap = incoming(800.0);
        let fp = fingerprint(Side::Left, &snap.snapshot).unwrap();
        let ticket = g.begin_save(Side::Left, 0, fp);
        g.settle_save(ticket, true, false, 0);
        assert_eq!(offer(&mut g, Side::Left, &snap, 0), Admission::Duplicate);
    }

    #[test]
    fn test_failed_save_forgets_fingerprint() {
        let mut g = guard();
        let snap = incoming(800.0);
        let fp = fingerprint(Side::Left, &snap.snapshot).unwrap();
        let version = g.record_mutation(Side::Left, 0);
        let ticket = g.begin_save(Side::Left, version, fp);
        let settled = g.settle_save(ticket, false, false, 0).unwrap();
        assert!(!settled.ok);
        assert_eq!(g.state(Side::Left), SyncState::LocallyDirty);
        assert_eq!(g.acknowledged_version(), 0);
        assert!(offer(&mut g, Side::Left, &snap, 10_000).is_applied());
    }

    #[test]
    fn test_redelivered_payload_after_edit_is_duplicate() {
        let mut g = guard();
        let persisted = incoming(800.0);
        assert!(offer(&mut g, Side::Left, &persisted, 0).is_applied());

        let version = g.record_mutation(Side::Left, 1_000);
        let ticket = g.begin_save(Side::Left, version, "edited".into());
        g.settle_save(ticket, false, false, 1_000);

        assert_eq!(offer(&mut g, Side::Left, &persisted, 7_000), Admission::Duplicate);
        assert!(g.has_pending_changes());
        assert_eq!(g.state(Side::Left), SyncState::LocallyDirty);
    }

    #[test]
    fn test_settle_by_version_out_of_order() {
        let mut g = guard();
        let first = g.record_mutation(Side::Left, 0);
        g.begin_save(Side::Left, first, "a".into());
        let second = g.record_mutation(Side::Back, 0);
        g.begin_save(Side::Back, second, "b".into());

        let settled = g.settle_version(Side::Back, second, true, 100).unwrap();
        assert_eq!((settled.side, settled.version), (Side::Back, 2));
        assert_eq!(g.state(Side::Back), SyncState::Synced);
        assert_eq!(g.state(Side::Left), SyncState::LocallyDirty);
        assert!(g.settle_version(Side::Back, second, true, 100).is_none());

        g.settle_version(Side::Left, first, true, 200).unwrap();
        assert!(g.is_saving(699));
        assert!(!g.is_saving(700));
    }

    #[test]
    fn test_versioned_snapshots() {
        let mut g = guard();
        g.record_mutation(Side::Left, 0);
        let v2 = g.record_mutation(Side::Left, 0);

        let stale = IncomingSnapshot::versioned(SideState::new(240.0, 700.0).to_snapshot(), 1);
        assert_eq!(
            offer(&mut g, Side::Left, &stale, 60_000),
            Admission::Stale { acknowledged: 1, local: 2 }
        );

        // current acknowledgement skips the wall-clock window
        let fresh = IncomingSnapshot::versioned(SideState::new(240.0, 700.0).to_snapshot(), v2);
        assert!(offer(&mut g, Side::Left, &fresh, 1).is_applied());
        assert_eq!(g.acknowledged_version(), 2);
    }

    #[test]
    fn test_newer_edit_keeps_side_dirty_after_settle() {
        let mut g = guard();
        let v1 = g.record_mutation(Side::Left, 0);
        let ticket = g.begin_save(Side::Left, v1, "a".into());
        g.record_mutation(Side::Left, 1);
        g.settle_save(ticket, true, false, 2);
        assert_eq!(g.state(Side::Left), SyncState::LocallyDirty);
    }

    #[test]
    fn test_initial_emission_once() {
        let mut g = guard();
        assert!(g.needs_initial_emission(Side::Back));
        g.mark_initial_emitted(Side::Back);
        assert!(!g.needs_initial_emission(Side::Back));
        assert_eq!(g.state(Side::Back), SyncState::Synced);

        assert!(offer(&mut g, Side::Right, &incoming(800.0), 0).is_applied());
        assert!(!g.needs_initial_emission(Side::Right));
    }

    #[test]
    fn test_settle_oldest_applies_grace() {
        let mut g = guard();
        g.begin_save(Side::Left, 0, "a".into());
        g.begin_save(Side::Right, 0, "b".into());
        assert_eq!(g.settle_oldest(true, 0).unwrap().side, Side::Left);
        assert!(g.is_saving(1_000));
        assert_eq!(g.settle_oldest(true, 1_000).unwrap().side, Side::Right);
        assert!(g.is_saving(1_499));
        assert!(!g.is_saving(1_500));
        assert!(g.settle_oldest(true, 2_000).is_none());
    }

    #[test]
    fn test_fingerprint_depends_on_side_and_content() {
        let snap = SideState::new(240.0, 800.0).to_snapshot();
        let a = fingerprint(Side::Left, &snap).unwrap();
        assert_eq!(a, fingerprint(Side::Left, &snap).unwrap());
        assert_ne!(a, fingerprint(Side::Right, &snap).unwrap());
        assert_eq!(a.len(), 64);
    }
}
