//! Remote track bookkeeping.
//!
//! The registry records every track a remote participant has published,
//! in publication order, together with whether the local side is
//! subscribed to it. Only subscribed video tracks are renderable. A record
//! lives until the track is unpublished or unsubscribed, or its owner leaves.

use common::types::TrackId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Track name that marks a video track as a screen share.
pub const SCREEN_SHARE_TRACK_NAME: &str = "screen";

/// Name given to the locally captured microphone track.
pub const LOCAL_AUDIO_TRACK_NAME: &str = "microphone";

/// Name given to the locally captured camera track.
pub const LOCAL_VIDEO_TRACK_NAME: &str = "camera";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
            TrackKind::Data => "data",
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A published media track as described by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TrackInfo {
    pub fn new(id: impl Into<TrackId>, kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_screen_share(&self) -> bool {
        self.kind == TrackKind::Video && self.name == SCREEN_SHARE_TRACK_NAME
    }
}

/// A track addressed by its owning participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    pub participant: String,
    pub track_id: TrackId,
}

impl TrackRef {
    pub fn new(participant: impl Into<String>, track_id: impl Into<TrackId>) -> Self {
        Self {
            participant: participant.into(),
            track_id: track_id.into(),
        }
    }
}

impl std::fmt::Display for TrackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.participant, self.track_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRecord {
    pub info: TrackInfo,
    pub subscribed: bool,
}

/// Per-participant track records, keyed by participant identity.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    by_participant: HashMap<String, Vec<TrackRecord>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records_mut(&mut self, participant: &str) -> &mut Vec<TrackRecord> {
        self.by_participant
            .entry(participant.to_string())
            .or_default()
    }

    fn record_mut(&mut self, participant: &str, track_id: &TrackId) -> Option<&mut TrackRecord> {
        self.by_participant
            .get_mut(participant)?
            .iter_mut()
            .find(|r| &r.info.id == track_id)
    }

    /// Record a publication. Returns `true` if the track was not known before.
    ///
    /// Re-publishing a known track refreshes its metadata and keeps its
    /// subscription state.
    pub fn publish(&mut self, participant: &str, info: TrackInfo) -> bool {
        if let Some(existing) = self.record_mut(participant, &info.id) {
            existing.info = info;
            return false;
        }
        self.records_mut(participant).push(TrackRecord {
            info,
            subscribed: false,
        });
        true
    }

    /// Remove a publication. Returns the removed record.
    pub fn unpublish(&mut self, participant: &str, track_id: &TrackId) -> Option<TrackRecord> {
        let records = self.by_participant.get_mut(participant)?;
        let index = records.iter().position(|r| &r.info.id == track_id)?;
        Some(records.remove(index))
    }

    /// Mark a track subscribed, publishing it first if unknown.
    ///
    /// Returns `false` when the track was already subscribed.
    pub fn subscribe(&mut self, participant: &str, info: TrackInfo) -> bool {
        if let Some(existing) = self.record_mut(participant, &info.id) {
            let changed = !existing.subscribed;
            existing.info = info;
            existing.subscribed = true;
            return changed;
        }
        self.records_mut(participant).push(TrackRecord {
            info,
            subscribed: true,
        });
        true
    }

    /// Drop a track on unsubscribe. Returns its kind if it was subscribed.
    ///
    /// A later publish or subscribe for the same id starts a fresh record.
    pub fn unsubscribe(&mut self, participant: &str, track_id: &TrackId) -> Option<TrackKind> {
        let record = self.unpublish(participant, track_id)?;
        record.subscribed.then_some(record.info.kind)
    }

    /// Update a track's enabled flag. Returns the record if the flag changed.
    pub fn set_enabled(
        &mut self,
        participant: &str,
        track_id: &TrackId,
        enabled: bool,
    ) -> Option<&TrackRecord> {
        let Some(record) = self.record_mut(participant, track_id) else {
            debug!(
                target: "call.compose",
                participant = %participant,
                track_id = %track_id,
                "enabled change for unknown track ignored"
            );
            return None;
        };
        if record.info.enabled == enabled {
            return None;
        }
        record.info.enabled = enabled;
        Some(&*record)
    }

    /// Drop every record of a participant, returning them in publication order.
    pub fn remove_participant(&mut self, participant: &str) -> Vec<TrackRecord> {
        self.by_participant.remove(participant).unwrap_or_default()
    }

    pub fn tracks(&self, participant: &str) -> &[TrackRecord] {
        self.by_participant
            .get(participant)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, participant: &str, track_id: &TrackId) -> Option<&TrackRecord> {
        self.tracks(participant)
            .iter()
            .find(|r| &r.info.id == track_id)
    }

    /// Subscribed video tracks of one participant, in publication order.
    pub fn subscribed_video<'a>(
        &'a self,
        participant: &str,
    ) -> impl Iterator<Item = &'a TrackInfo> + 'a {
        self.tracks(participant)
            .iter()
            .filter(|r| r.subscribed && r.info.kind == TrackKind::Video)
            .map(|r| &r.info)
    }

    pub fn clear(&mut self) {
        self.by_participant.clear();
    }

    /// Total number of known tracks across participants.
    pub fn len(&self) -> usize {
        self.by_participant.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn video(id: &str, name: &str) -> TrackInfo {
        TrackInfo::new(id, TrackKind::Video, name)
    }

    #[test]
    fn test_screen_share_detection() {
        assert!(video("MT1", "screen").is_screen_share());
        assert!(!video("MT1", "camera").is_screen_share());
        assert!(!TrackInfo::new("MT2", TrackKind::Audio, "screen").is_screen_share());
    }

    #[test]
    fn test_publish_is_not_renderable_until_subscribed() {
        let mut registry = TrackRegistry::new();
        assert!(registry.publish("alice", video("MT1", "camera")));
        assert_eq!(registry.subscribed_video("alice").count(), 0);

        assert!(registry.subscribe("alice", video("MT1", "camera")));
        let ids: Vec<_> = registry
            .subscribed_video("alice")
            .map(|t| t.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["MT1"]);
    }

    #[test]
    fn test_duplicate_subscribe_is_noop() {
        let mut registry = TrackRegistry::new();
        assert!(registry.subscribe("alice", video("MT1", "camera")));
        assert!(!registry.subscribe("alice", video("MT1", "camera")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_republish_keeps_subscription() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", video("MT1", "camera"));
        assert!(!registry.publish("alice", video("MT1", "screen")));

        let record = registry.get("alice", &TrackId::from("MT1")).unwrap();
        assert!(record.subscribed);
        assert!(record.info.is_screen_share());
    }

    #[test]
    fn test_unsubscribe_reports_kind_once() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", TrackInfo::new("MT9", TrackKind::Audio, "microphone"));

        let id = TrackId::from("MT9");
        assert_eq!(registry.unsubscribe("alice", &id), Some(TrackKind::Audio));
        assert!(registry.get("alice", &id).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.unsubscribe("alice", &id), None);
        assert_eq!(registry.unsubscribe("bob", &id), None);
    }

    #[test]
    fn test_unsubscribe_drops_published_only_track() {
        let mut registry = TrackRegistry::new();
        registry.publish("alice", video("MT1", "camera"));
        assert_eq!(registry.unsubscribe("alice", &TrackId::from("MT1")), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_enabled_only_reports_changes() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", video("MT1", "camera"));
        let id = TrackId::from("MT1");

        assert!(registry.set_enabled("alice", &id, true).is_none());
        let record = registry.set_enabled("alice", &id, false).unwrap();
        assert!(!record.info.enabled);
        assert!(registry.set_enabled("alice", &TrackId::from("nope"), false).is_none());
    }

    #[test]
    fn test_publication_order_preserved() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", video("MT2", "camera"));
        registry.subscribe("alice", video("MT1", "screen"));
        registry.subscribe("alice", TrackInfo::new("MT3", TrackKind::Audio, "mic"));

        let names: Vec<_> = registry
            .subscribed_video("alice")
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["camera", "screen"]);
    }

    #[test]
    fn test_remove_participant() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", video("MT1", "camera"));
        registry.publish("alice", video("MT2", "screen"));
        registry.subscribe("bob", video("MT3", "camera"));

        let removed = registry.remove_participant("alice");
        assert_eq!(removed.len(), 2);
        assert!(registry.tracks("alice").is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unpublish() {
        let mut registry = TrackRegistry::new();
        registry.subscribe("alice", video("MT1", "camera"));
        let removed = registry.unpublish("alice", &TrackId::from("MT1")).unwrap();
        assert!(removed.subscribed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_track_info_enabled_defaults_true_on_deserialize() {
        let info: TrackInfo =
            serde_json::from_str(r#"{"id":"MT1","kind":"video","name":"camera"}"#).unwrap();
        assert!(info.enabled);
    }
}
