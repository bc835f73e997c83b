//! View composition.
//!
//! Composition is a pure function of the roster, the track registry, and
//! the policy: it clears the pool and rebuilds every assignment from
//! scratch, so running it twice on unchanged state yields an identical
//! [`Assignment`]. The previous primary only matters when several screen
//! shares are live, in which case the incumbent keeps the primary slot.
//!
//! Placement rules:
//! - the side list has exactly one slot per remote participant;
//! - the primary track is chosen before any side slot is filled;
//! - a screen share always takes the primary slot, whatever order it
//!   arrived in; other screen shares wait and never take a side slot;
//! - without a screen share, and when the policy allows it, the last
//!   non-screen track in roster order is promoted into the primary slot;
//! - remaining non-screen tracks fill side slots in roster order, then
//!   track publication order, so a track is only left out once every
//!   side slot is taken.

use crate::errors::SlotError;
use crate::media::roster::Roster;
use crate::media::slots::{Assignment, SlotId, SlotPool};
use crate::media::tracks::{TrackRef, TrackRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionPolicy {
    /// Promote a side track into an otherwise empty primary slot.
    pub promote_fallback: bool,
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        Self {
            promote_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimarySource {
    ScreenShare,
    Fallback,
}

/// Result of one composition pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub assignment: Assignment,
    pub primary: Option<TrackRef>,
    pub source: Option<PrimarySource>,
    /// Camera-style tracks that did not fit into a side slot.
    pub unassigned: Vec<TrackRef>,
    /// Screen shares waiting for the primary slot.
    pub held_screens: Vec<TrackRef>,
}

struct Candidate {
    track: TrackRef,
    enabled: bool,
    screen: bool,
}

/// Rebuild the pool from scratch.
pub fn compose(
    roster: &Roster,
    registry: &TrackRegistry,
    pool: &mut SlotPool,
    policy: CompositionPolicy,
    incumbent: Option<&TrackRef>,
) -> Result<Composition, SlotError> {
    pool.clear_all();
    pool.resize(roster.len());

    let candidates: Vec<Candidate> = roster
        .identities()
        .flat_map(|identity| {
            registry.subscribed_video(identity).map(move |info| Candidate {
                track: TrackRef::new(identity, info.id.clone()),
                enabled: info.enabled,
                screen: info.is_screen_share(),
            })
        })
        .collect();

    let screen = incumbent
        .and_then(|p| candidates.iter().find(|c| c.screen && &c.track == p))
        .or_else(|| candidates.iter().rev().find(|c| c.screen));
    let fallback = candidates.iter().rev().find(|c| !c.screen);

    let (primary, source) = match (screen, fallback) {
        (Some(candidate), _) => (Some(candidate), Some(PrimarySource::ScreenShare)),
        (None, Some(candidate)) if policy.promote_fallback => {
            (Some(candidate), Some(PrimarySource::Fallback))
        }
        _ => (None, None),
    };

    let mut unassigned = Vec::new();
    let mut held_screens = Vec::new();
    for candidate in &candidates {
        if primary.is_some_and(|p| p.track == candidate.track) {
            continue;
        }
        if candidate.screen {
            held_screens.push(candidate.track.clone());
            continue;
        }
        match pool.first_free_side() {
            Some(index) => {
                pool.attach(
                    SlotId::Side(index),
                    candidate.track.clone(),
                    candidate.enabled,
                )?;
            }
            None => {
                debug!(
                    target: "call.compose",
                    track = %candidate.track,
                    "No free side slot, track left unassigned"
                );
                unassigned.push(candidate.track.clone());
            }
        }
    }

    if let Some(candidate) = primary {
        pool.attach(SlotId::Primary, candidate.track.clone(), candidate.enabled)?;
    }

    let primary = primary.map(|c| c.track.clone());
    if primary.as_ref() != incumbent {
        info!(
            target: "call.compose",
            previous = ?incumbent.map(ToString::to_string),
            current = ?primary.as_ref().map(ToString::to_string),
            source = ?source,
            "Primary slot changed"
        );
    }

    Ok(Composition {
        assignment: pool.assignment(),
        primary,
        source,
        unassigned,
        held_screens,
    })
}

/// Stateful wrapper that remembers the current primary between passes.
#[derive(Debug, Default)]
pub struct Composer {
    policy: CompositionPolicy,
    primary: Option<TrackRef>,
}

impl Composer {
    pub fn new(policy: CompositionPolicy) -> Self {
        Self {
            policy,
            primary: None,
        }
    }

    pub fn policy(&self) -> CompositionPolicy {
        self.policy
    }

    pub fn primary(&self) -> Option<&TrackRef> {
        self.primary.as_ref()
    }

    pub fn recompose(
        &mut self,
        roster: &Roster,
        registry: &TrackRegistry,
        pool: &mut SlotPool,
    ) -> Result<Composition, SlotError> {
        let composition = compose(roster, registry, pool, self.policy, self.primary.as_ref())?;
        self.primary.clone_from(&composition.primary);
        Ok(composition)
    }

    pub fn reset(&mut self) {
        self.primary = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::media::tracks::{TrackInfo, TrackKind};
    use common::types::TrackId;

    const RESERVED: CompositionPolicy = CompositionPolicy {
        promote_fallback: false,
    };
    const PROMOTING: CompositionPolicy = CompositionPolicy {
        promote_fallback: true,
    };

    struct Fixture {
        roster: Roster,
        registry: TrackRegistry,
        pool: SlotPool,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                roster: Roster::new(),
                registry: TrackRegistry::new(),
                pool: SlotPool::new(),
            }
        }

        fn join(&mut self, identity: &str, tracks: &[(&str, &str)]) {
            self.roster.add(identity);
            for (id, name) in tracks {
                self.registry
                    .subscribe(identity, TrackInfo::new(*id, TrackKind::Video, *name));
            }
        }

        fn leave(&mut self, identity: &str) {
            self.roster.remove(identity);
            self.registry.remove_participant(identity);
        }

        fn compose(&mut self, policy: CompositionPolicy, incumbent: Option<&TrackRef>) -> Composition {
            compose(
                &self.roster,
                &self.registry,
                &mut self.pool,
                policy,
                incumbent,
            )
            .unwrap()
        }
    }

    #[test]
    fn test_empty_roster_has_no_slots() {
        let mut f = Fixture::new();
        let c = f.compose(PROMOTING, None);
        assert!(c.assignment.side.is_empty());
        assert!(c.assignment.primary.is_empty());
        assert!(c.primary.is_none());
    }

    #[test]
    fn test_camera_only_participants_stay_on_side_when_reserved() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera")]);
        f.join("bob", &[("MT2", "camera")]);
        f.join("carol", &[("MT3", "camera")]);

        let c = f.compose(RESERVED, None);

        assert_eq!(c.assignment.side.len(), 3);
        assert!(c.assignment.primary.is_empty());
        assert!(!c.assignment.primary.visible);
        assert_eq!(c.assignment.side_participants(), vec!["alice", "bob", "carol"]);
        assert!(c.assignment.side.iter().all(|s| s.visible));
    }

    #[test]
    fn test_last_side_track_promoted_when_no_screen() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera")]);
        f.join("bob", &[("MT2", "camera")]);

        let c = f.compose(PROMOTING, None);

        assert_eq!(c.primary, Some(TrackRef::new("bob", "MT2")));
        assert_eq!(c.source, Some(PrimarySource::Fallback));
        assert_eq!(c.assignment.side.len(), 2);
        assert_eq!(
            c.assignment.slot_of(&TrackRef::new("alice", "MT1")),
            Some(SlotId::Side(0))
        );
        let vacated = c.assignment.side.get(1).unwrap();
        assert!(vacated.is_empty());
        assert!(!vacated.visible);
    }

    #[test]
    fn test_screen_share_takes_primary_over_fallback() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera")]);
        f.join("bob", &[("MT2", "screen")]);

        for policy in [RESERVED, PROMOTING] {
            let c = f.compose(policy, None);
            assert_eq!(c.primary, Some(TrackRef::new("bob", "MT2")));
            assert_eq!(c.source, Some(PrimarySource::ScreenShare));
            assert_eq!(
                c.assignment.slot_of(&TrackRef::new("alice", "MT1")),
                Some(SlotId::Side(0))
            );
            assert!(c.assignment.side.get(1).unwrap().is_empty());
        }
    }

    #[test]
    fn test_screen_share_participant_camera_stays_on_side() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera"), ("MT2", "screen")]);

        let c = f.compose(RESERVED, None);
        assert_eq!(c.primary, Some(TrackRef::new("alice", "MT2")));
        assert_eq!(
            c.assignment.slot_of(&TrackRef::new("alice", "MT1")),
            Some(SlotId::Side(0))
        );
    }

    #[test]
    fn test_incumbent_screen_keeps_primary() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "screen")]);
        f.join("bob", &[("MT2", "screen")]);

        let first = f.compose(PROMOTING, None);
        assert_eq!(first.primary, Some(TrackRef::new("bob", "MT2")));

        let incumbent = TrackRef::new("alice", "MT1");
        let second = f.compose(PROMOTING, Some(&incumbent));
        assert_eq!(second.primary, Some(incumbent));
        assert!(second
            .assignment
            .slot_of(&TrackRef::new("bob", "MT2"))
            .is_none());
        assert_eq!(second.held_screens, vec![TrackRef::new("bob", "MT2")]);
    }

    #[test]
    fn test_fallback_is_last_participant_track() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera"), ("MT2", "camera")]);
        f.join("bob", &[("MT3", "camera")]);

        let c = f.compose(PROMOTING, None);
        assert_eq!(c.primary, Some(TrackRef::new("bob", "MT3")));
        assert_eq!(c.source, Some(PrimarySource::Fallback));
        assert_eq!(
            c.assignment.slot_of(&TrackRef::new("alice", "MT1")),
            Some(SlotId::Side(0))
        );
        assert_eq!(
            c.assignment.slot_of(&TrackRef::new("alice", "MT2")),
            Some(SlotId::Side(1))
        );
        assert!(c.unassigned.is_empty());
    }

    #[test]
    fn test_losing_screen_share_leaves_side_slots_to_cameras() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera"), ("MT2", "screen")]);
        f.join("bob", &[("MT3", "camera"), ("MT4", "screen")]);

        for policy in [RESERVED, PROMOTING] {
            let c = f.compose(policy, None);
            assert_eq!(c.primary, Some(TrackRef::new("bob", "MT4")));
            assert_eq!(
                c.assignment.slot_of(&TrackRef::new("alice", "MT1")),
                Some(SlotId::Side(0))
            );
            assert_eq!(
                c.assignment.slot_of(&TrackRef::new("bob", "MT3")),
                Some(SlotId::Side(1))
            );
            assert!(c
                .assignment
                .slot_of(&TrackRef::new("alice", "MT2"))
                .is_none());
            assert!(c.unassigned.is_empty());
            assert_eq!(c.held_screens, vec![TrackRef::new("alice", "MT2")]);
        }
    }

    #[test]
    fn test_early_screen_share_survives_later_cameras() {
        let mut f = Fixture::new();
        let mut composer = Composer::new(PROMOTING);
        f.join("alice", &[("MT1", "screen")]);
        let first = composer
            .recompose(&f.roster, &f.registry, &mut f.pool)
            .unwrap();
        assert_eq!(first.primary, Some(TrackRef::new("alice", "MT1")));

        f.join("bob", &[("MT2", "camera")]);
        f.join("carol", &[("MT3", "camera")]);
        let c = composer
            .recompose(&f.roster, &f.registry, &mut f.pool)
            .unwrap();
        assert_eq!(c.primary, Some(TrackRef::new("alice", "MT1")));
        assert_eq!(c.source, Some(PrimarySource::ScreenShare));
        assert_eq!(c.assignment.side_participants(), vec!["bob", "carol"]);
    }

    #[test]
    fn test_no_track_in_two_slots() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera"), ("MT2", "screen")]);
        f.join("bob", &[("MT3", "camera")]);
        f.join("carol", &[]);

        let c = f.compose(PROMOTING, None);
        let mut seen: Vec<&TrackRef> = c.assignment.occupied_side().collect();
        seen.extend(c.assignment.primary.occupant.as_ref());
        let total = seen.len();
        seen.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        seen.dedup();
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn test_composition_is_idempotent() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera")]);
        f.join("bob", &[("MT2", "screen"), ("MT3", "camera")]);
        f.join("carol", &[("MT4", "camera")]);

        for policy in [RESERVED, PROMOTING] {
            let mut composer = Composer::new(policy);
            let first = composer
                .recompose(&f.roster, &f.registry, &mut f.pool)
                .unwrap();
            let second = composer
                .recompose(&f.roster, &f.registry, &mut f.pool)
                .unwrap();
            assert_eq!(first, second);
            assert_eq!(
                serde_json::to_vec(&first.assignment).unwrap(),
                serde_json::to_vec(&second.assignment).unwrap()
            );
        }
    }

    #[test]
    fn test_overflow_tracks_left_unassigned() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera"), ("MT2", "camera"), ("MT3", "camera")]);

        let c = f.compose(RESERVED, None);
        assert_eq!(c.assignment.side.len(), 1);
        assert_eq!(c.unassigned.len(), 2);
    }

    #[test]
    fn test_disabled_track_shows_placeholder() {
        let mut f = Fixture::new();
        f.roster.add("alice");
        f.registry.subscribe(
            "alice",
            TrackInfo::new("MT1", TrackKind::Video, "camera").with_enabled(false),
        );

        let c = f.compose(RESERVED, None);
        assert!(c.assignment.side.first().unwrap().placeholder);
        assert!(c.assignment.side.first().unwrap().visible);
    }

    #[test]
    fn test_unsubscribed_and_audio_tracks_not_rendered() {
        let mut f = Fixture::new();
        f.roster.add("alice");
        f.registry
            .publish("alice", TrackInfo::new("MT1", TrackKind::Video, "camera"));
        f.registry
            .subscribe("alice", TrackInfo::new("MT2", TrackKind::Audio, "microphone"));

        let c = f.compose(PROMOTING, None);
        assert_eq!(c.assignment.side.len(), 1);
        assert_eq!(c.assignment.occupied_side().count(), 0);
        assert!(c.primary.is_none());
    }

    #[test]
    fn test_screen_sharer_leaving_releases_primary() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "camera")]);
        f.join("bob", &[("MT2", "screen")]);
        let before = f.compose(RESERVED, None);
        assert_eq!(before.primary, Some(TrackRef::new("bob", "MT2")));

        f.leave("bob");
        let reserved = f.compose(RESERVED, before.primary.as_ref());
        assert!(reserved.primary.is_none());
        assert_eq!(reserved.assignment.side.len(), 1);

        let promoted = f.compose(PROMOTING, before.primary.as_ref());
        assert_eq!(promoted.primary, Some(TrackRef::new("alice", "MT1")));
    }

    #[test]
    fn test_composer_reset_forgets_incumbent() {
        let mut f = Fixture::new();
        f.join("alice", &[("MT1", "screen")]);
        let mut composer = Composer::new(RESERVED);
        composer
            .recompose(&f.roster, &f.registry, &mut f.pool)
            .unwrap();
        assert_eq!(
            composer.primary().map(|t| t.track_id.clone()),
            Some(TrackId::from("MT1"))
        );
        composer.reset();
        assert!(composer.primary().is_none());
    }

    mod invariants {
        use super::*;
        use proptest::prelude::*;

        /// Per participant: video tracks as (is_screen, enabled).
        fn rosters() -> impl Strategy<Value = Vec<Vec<(bool, bool)>>> {
            prop::collection::vec(
                prop::collection::vec((any::<bool>(), any::<bool>()), 0..4),
                0..5,
            )
        }

        fn build(roster: &[Vec<(bool, bool)>]) -> Fixture {
            let mut f = Fixture::new();
            for (p, tracks) in roster.iter().enumerate() {
                let identity = format!("p{p}");
                f.roster.add(&identity);
                for (t, (screen, enabled)) in tracks.iter().enumerate() {
                    let name = if *screen { "screen" } else { "camera" };
                    f.registry.subscribe(
                        &identity,
                        TrackInfo::new(format!("T{p}-{t}"), TrackKind::Video, name)
                            .with_enabled(*enabled),
                    );
                }
            }
            f
        }

        proptest! {
            #[test]
            fn no_track_left_out_while_side_slot_empty(
                roster in rosters(),
                promote in any::<bool>(),
            ) {
                let mut f = build(&roster);
                let policy = CompositionPolicy { promote_fallback: promote };
                let c = f.compose(policy, None);

                prop_assert_eq!(c.assignment.side.len(), roster.len());
                if !c.unassigned.is_empty() {
                    prop_assert!(c.assignment.side.iter().all(|s| !s.is_empty()));
                }
                for slot in &c.assignment.side {
                    prop_assert_eq!(slot.visible, !slot.is_empty());
                }
            }

            #[test]
            fn every_camera_placed_or_reported(
                roster in rosters(),
                promote in any::<bool>(),
            ) {
                let mut f = build(&roster);
                let policy = CompositionPolicy { promote_fallback: promote };
                let c = f.compose(policy, None);

                let mut placed: Vec<&TrackRef> = c.assignment.occupied_side().collect();
                placed.extend(c.assignment.primary.occupant.as_ref());
                let before = placed.len();
                placed.sort_by(|a, b| a.track_id.cmp(&b.track_id));
                placed.dedup();
                prop_assert_eq!(placed.len(), before);

                let has_screen = roster.iter().flatten().any(|(screen, _)| *screen);
                prop_assert_eq!(
                    c.source == Some(PrimarySource::ScreenShare),
                    has_screen
                );
                for (p, tracks) in roster.iter().enumerate() {
                    for (t, (screen, _)) in tracks.iter().enumerate() {
                        let track = TrackRef::new(format!("p{p}"), format!("T{p}-{t}"));
                        let rendered = c.assignment.slot_of(&track).is_some();
                        if *screen {
                            prop_assert!(rendered || c.held_screens.contains(&track));
                        } else {
                            prop_assert!(rendered || c.unassigned.contains(&track));
                        }
                    }
                }
            }

            #[test]
            fn recomposition_is_stable(roster in rosters(), promote in any::<bool>()) {
                let mut f = build(&roster);
                let mut composer = Composer::new(CompositionPolicy { promote_fallback: promote });
                let first = composer
                    .recompose(&f.roster, &f.registry, &mut f.pool)
                    .unwrap();
                let second = composer
                    .recompose(&f.roster, &f.registry, &mut f.pool)
                    .unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
