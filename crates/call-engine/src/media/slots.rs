//! Render slots.
//!
//! One primary slot plus an ordered, resizable list of side slots. Each
//! slot holds at most one track, and a track occupies at most one slot.
//! The pool is host-agnostic: renderers observe [`Assignment`] snapshots
//! and bind their own views to them.

use crate::errors::SlotError;
use crate::media::tracks::TrackRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    Primary,
    Side(usize),
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Primary => f.write_str("primary"),
            SlotId::Side(index) => write!(f, "side[{index}]"),
        }
    }
}

/// Render state of one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub occupant: Option<TrackRef>,
    pub visible: bool,
    /// Show the placeholder avatar instead of video (track disabled).
    pub placeholder: bool,
}

impl Slot {
    fn occupy(&mut self, track: TrackRef, enabled: bool) {
        self.occupant = Some(track);
        self.visible = true;
        self.placeholder = !enabled;
    }

    fn vacate(&mut self) -> Option<TrackRef> {
        self.visible = false;
        self.placeholder = false;
        self.occupant.take()
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Snapshot of the whole pool, published to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub primary: Slot,
    pub side: Vec<Slot>,
}

impl Assignment {
    pub fn slot_of(&self, track: &TrackRef) -> Option<SlotId> {
        if self.primary.occupant.as_ref() == Some(track) {
            return Some(SlotId::Primary);
        }
        self.side
            .iter()
            .position(|s| s.occupant.as_ref() == Some(track))
            .map(SlotId::Side)
    }

    /// Side slots currently holding a track.
    pub fn occupied_side(&self) -> impl Iterator<Item = &TrackRef> {
        self.side.iter().filter_map(|s| s.occupant.as_ref())
    }

    /// Participants with at least one track in a side slot.
    pub fn side_participants(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for track in self.occupied_side() {
            if !seen.contains(&track.participant.as_str()) {
                seen.push(&track.participant);
            }
        }
        seen
    }
}

#[derive(Debug, Default)]
pub struct SlotPool {
    primary: Slot,
    side: Vec<Slot>,
}

impl SlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side_len(&self) -> usize {
        self.side.len()
    }

    /// Grow or shrink the side list to exactly `target` slots.
    ///
    /// Shrinking drops trailing slots together with their occupants.
    pub fn resize(&mut self, target: usize) {
        let current = self.side.len();
        if target == current {
            return;
        }
        if target < current {
            let dropped = self
                .side
                .iter()
                .skip(target)
                .filter(|s| s.occupant.is_some())
                .count();
            debug!(
                target: "call.slots",
                from = current,
                to = target,
                dropped_occupants = dropped,
                "Shrinking side slots"
            );
        }
        self.side.resize_with(target, Slot::default);
    }

    fn slot_mut(&mut self, id: SlotId) -> Result<&mut Slot, SlotError> {
        match id {
            SlotId::Primary => Ok(&mut self.primary),
            SlotId::Side(index) => {
                let len = self.side.len();
                self.side
                    .get_mut(index)
                    .ok_or(SlotError::OutOfRange { index, len })
            }
        }
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        match id {
            SlotId::Primary => Some(&self.primary),
            SlotId::Side(index) => self.side.get(index),
        }
    }

    /// Bind a track to a slot and make it visible.
    ///
    /// If the track already occupies another slot it is moved, so a track
    /// is never rendered twice.
    pub fn attach(&mut self, id: SlotId, track: TrackRef, enabled: bool) -> Result<(), SlotError> {
        // Validate the destination before touching any other slot.
        self.slot_mut(id)?;
        if let Some(current) = self.find(&track) {
            if current != id {
                self.detach(current)?;
            }
        }
        self.slot_mut(id)?.occupy(track, enabled);
        Ok(())
    }

    /// Unbind the track of a slot and hide the slot.
    pub fn detach(&mut self, id: SlotId) -> Result<TrackRef, SlotError> {
        self.slot_mut(id)?
            .vacate()
            .ok_or(SlotError::NotAttached(id))
    }

    /// Vacate every slot; the side list keeps its length.
    pub fn clear_all(&mut self) {
        self.primary.vacate();
        for slot in &mut self.side {
            slot.vacate();
        }
    }

    pub fn find(&self, track: &TrackRef) -> Option<SlotId> {
        if self.primary.occupant.as_ref() == Some(track) {
            return Some(SlotId::Primary);
        }
        self.side
            .iter()
            .position(|s| s.occupant.as_ref() == Some(track))
            .map(SlotId::Side)
    }

    pub fn first_free_side(&self) -> Option<usize> {
        self.side.iter().position(Slot::is_empty)
    }

    /// Toggle the placeholder of whichever slot shows `track`.
    ///
    /// Returns the slot that changed, if any.
    pub fn set_placeholder(&mut self, track: &TrackRef, enabled: bool) -> Option<SlotId> {
        let id = self.find(track)?;
        let slot = self.slot_mut(id).ok()?;
        if slot.placeholder == !enabled {
            return None;
        }
        slot.placeholder = !enabled;
        Some(id)
    }

    pub fn assignment(&self) -> Assignment {
        Assignment {
            primary: self.primary.clone(),
            side: self.side.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn track(participant: &str, id: &str) -> TrackRef {
        TrackRef::new(participant, id)
    }

    #[test]
    fn test_resize_grows_and_shrinks() {
        let mut pool = SlotPool::new();
        pool.resize(3);
        assert_eq!(pool.side_len(), 3);

        pool.attach(SlotId::Side(2), track("carol", "MT3"), true).unwrap();
        pool.resize(2);
        assert_eq!(pool.side_len(), 2);
        assert!(pool.find(&track("carol", "MT3")).is_none());

        pool.resize(2);
        assert_eq!(pool.side_len(), 2);
    }

    #[test]
    fn test_attach_out_of_range() {
        let mut pool = SlotPool::new();
        pool.resize(1);
        let err = pool
            .attach(SlotId::Side(1), track("alice", "MT1"), true)
            .unwrap_err();
        assert_eq!(err, SlotError::OutOfRange { index: 1, len: 1 });
    }

    #[test]
    fn test_attach_moves_track_between_slots() {
        let mut pool = SlotPool::new();
        pool.resize(2);
        let alice = track("alice", "MT1");

        pool.attach(SlotId::Side(0), alice.clone(), true).unwrap();
        pool.attach(SlotId::Primary, alice.clone(), true).unwrap();

        assert_eq!(pool.find(&alice), Some(SlotId::Primary));
        let side0 = pool.slot(SlotId::Side(0)).unwrap();
        assert!(side0.is_empty());
        assert!(!side0.visible);
    }

    #[test]
    fn test_attach_failure_leaves_pool_untouched() {
        let mut pool = SlotPool::new();
        pool.resize(1);
        let alice = track("alice", "MT1");
        pool.attach(SlotId::Side(0), alice.clone(), true).unwrap();

        assert!(pool.attach(SlotId::Side(5), alice.clone(), true).is_err());
        assert_eq!(pool.find(&alice), Some(SlotId::Side(0)));
    }

    #[test]
    fn test_detach_unattached_is_error() {
        let mut pool = SlotPool::new();
        assert_eq!(
            pool.detach(SlotId::Primary).unwrap_err(),
            SlotError::NotAttached(SlotId::Primary)
        );
    }

    #[test]
    fn test_detach_hides_slot() {
        let mut pool = SlotPool::new();
        pool.attach(SlotId::Primary, track("bob", "MT2"), false).unwrap();
        assert!(pool.slot(SlotId::Primary).unwrap().placeholder);

        let detached = pool.detach(SlotId::Primary).unwrap();
        assert_eq!(detached, track("bob", "MT2"));
        let primary = pool.slot(SlotId::Primary).unwrap();
        assert!(!primary.visible);
        assert!(!primary.placeholder);
    }

    #[test]
    fn test_set_placeholder() {
        let mut pool = SlotPool::new();
        pool.resize(1);
        let alice = track("alice", "MT1");
        pool.attach(SlotId::Side(0), alice.clone(), true).unwrap();

        assert_eq!(pool.set_placeholder(&alice, false), Some(SlotId::Side(0)));
        assert!(pool.slot(SlotId::Side(0)).unwrap().placeholder);
        assert_eq!(pool.set_placeholder(&alice, false), None);
        assert_eq!(pool.set_placeholder(&track("ghost", "MT9"), true), None);
    }

    #[test]
    fn test_clear_all_keeps_length() {
        let mut pool = SlotPool::new();
        pool.resize(2);
        pool.attach(SlotId::Side(0), track("alice", "MT1"), true).unwrap();
        pool.attach(SlotId::Primary, track("bob", "MT2"), true).unwrap();

        pool.clear_all();
        let assignment = pool.assignment();
        assert_eq!(assignment.side.len(), 2);
        assert!(assignment.primary.is_empty());
        assert_eq!(assignment.occupied_side().count(), 0);
        assert_eq!(pool.first_free_side(), Some(0));
    }

    #[test]
    fn test_assignment_lookup() {
        let mut pool = SlotPool::new();
        pool.resize(2);
        pool.attach(SlotId::Side(1), track("alice", "MT1"), true).unwrap();
        pool.attach(SlotId::Side(0), track("alice", "MT4"), true).unwrap();

        let assignment = pool.assignment();
        assert_eq!(
            assignment.slot_of(&track("alice", "MT1")),
            Some(SlotId::Side(1))
        );
        assert_eq!(assignment.side_participants(), vec!["alice"]);
    }
}
