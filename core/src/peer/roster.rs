//! Presence Projector — derives the roster ("posse") from the registry.
//!
//! The roster is always rebuilt from scratch; it is never patched in place,
//! so it cannot retain a peer the registry has dropped.

use super::registry::PeerRegistry;
use super::PeerId;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PeerId,
    pub name: String,
    pub is_self: bool,
}

/// Self first, then connected peers in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: &PeerId) -> Option<&RosterEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.get(id).is_some()
    }

    pub fn local(&self) -> Option<&RosterEntry> {
        self.entries.first()
    }

    /// `(id, name)` pairs, convenient for assertions and display
    pub fn names(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|entry| (entry.id.to_string(), entry.name.clone()))
            .collect()
    }
}

/// Pure derivation of the roster from current registry state
pub fn project(registry: &PeerRegistry) -> Roster {
    let local = registry.local();
    let mut entries = Vec::with_capacity(1 + registry.peer_count());
    entries.push(RosterEntry {
        id: local.id.clone(),
        name: local.display_name.clone(),
        is_self: true,
    });
    entries.extend(registry.peers().iter().map(|record| RosterEntry {
        id: record.id.clone(),
        name: record.display_name.clone(),
        is_self: false,
    }));
    Roster { entries }
}

/// Holds the last computed roster and notifies subscribers on recompute
pub struct PresenceProjector {
    tx: watch::Sender<Roster>,
}

impl PresenceProjector {
    pub fn new(registry: &PeerRegistry) -> Self {
        let (tx, _rx) = watch::channel(project(registry));
        Self { tx }
    }

    pub fn recompute(&self, registry: &PeerRegistry) {
        let roster = project(registry);
        debug!("Roster recomputed: {} entries", roster.len());
        self.tx.send_replace(roster);
    }

    pub fn current(&self) -> Roster {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Roster> {
        self.tx.subscribe()
    }
}
