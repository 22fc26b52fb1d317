//! The set of currently authenticated users in a room.
//!
//! Snapshots are recomputed wholesale and broadcast on every auth success and
//! session close; clients replace their presence state rather than diffing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::auth::Identity;

/// One entry per authenticated, connected identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
}

impl From<&Identity> for PresenceEntry {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            avatar_ref: identity.avatar_ref.clone(),
        }
    }
}

#[derive(Default)]
pub struct PresenceTracker {
    entries: BTreeMap<String, PresenceEntry>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: &Identity) {
        self.entries
            .insert(identity.id.clone(), PresenceEntry::from(identity));
    }

    /// Returns `true` when an entry was actually removed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
