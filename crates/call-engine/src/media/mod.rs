//! Participant, track, and slot model plus the composition pass over it.

pub mod composition;
pub mod roster;
pub mod slots;
pub mod tracks;

pub use composition::{compose, Composer, Composition, CompositionPolicy, PrimarySource};
pub use roster::{Roster, RosterEntry};
pub use slots::{Assignment, Slot, SlotId, SlotPool};
pub use tracks::{TrackInfo, TrackKind, TrackRecord, TrackRef, TrackRegistry};
