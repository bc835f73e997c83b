//! Ordered set of remote participants.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub identity: String,
    pub joined_at: DateTime<Utc>,
}

/// Remote participants in arrival order, unique by identity.
///
/// The local participant is never a member.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant. Returns `false` if the identity is already present.
    pub fn add(&mut self, identity: &str) -> bool {
        if self.contains(identity) {
            return false;
        }
        self.entries.push(RosterEntry {
            identity: identity.to_string(),
            joined_at: Utc::now(),
        });
        true
    }

    /// Remove a participant by identity. Returns `false` if absent.
    pub fn remove(&mut self, identity: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.identity != identity);
        self.entries.len() != before
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|e| e.identity == identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identity.as_str())
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_deduplicated() {
        let mut roster = Roster::new();
        assert!(roster.add("alice"));
        assert!(!roster.add("alice"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_arrival_order_preserved() {
        let mut roster = Roster::new();
        roster.add("carol");
        roster.add("alice");
        roster.add("bob");
        let order: Vec<_> = roster.identities().collect();
        assert_eq!(order, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_remove_targets_identity_only() {
        let mut roster = Roster::new();
        roster.add("alice");
        roster.add("bob");
        roster.add("carol");

        assert!(roster.remove("bob"));
        assert!(!roster.remove("bob"));
        let order: Vec<_> = roster.identities().collect();
        assert_eq!(order, vec!["alice", "carol"]);
    }

    #[test]
    fn test_clear() {
        let mut roster = Roster::new();
        roster.add("alice");
        roster.clear();
        assert!(roster.is_empty());
        assert!(!roster.contains("alice"));
    }
}
