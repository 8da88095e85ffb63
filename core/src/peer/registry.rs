//! Peer Registry — the connected-peer set and the peer-id → display-name table.
//!
//! Join order is preserved; the roster lists peers in the order they joined.
//! Name updates may arrive before the join they belong to (the Transport does
//! not order channel traffic against lifecycle events), so `set_name` for an
//! unknown id is held until that peer joins. At most `MAX_HELD_NAMES` are
//! held; the oldest is evicted first, so announcements from peers that never
//! (re)join cannot grow the table without bound.

use super::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Upper bound on names held for peers that are not connected
pub const MAX_HELD_NAMES: usize = 64;

/// A known participant and its current display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: PeerId,
    pub display_name: String,
}

impl PeerRecord {
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeerRegistry {
    /// Synthetic record for the local player, never removed
    local: PeerRecord,
    /// Connected peers in join order
    connected: Vec<PeerRecord>,
    /// Names announced by peers that have not joined (yet)
    early_names: HashMap<PeerId, String>,
    /// Held ids, oldest first
    held_order: VecDeque<PeerId>,
    /// Placeholder for peers that have not announced a name
    unknown_name: String,
}

impl PeerRegistry {
    pub fn new(local: PeerRecord, unknown_name: impl Into<String>) -> Self {
        Self {
            local,
            connected: Vec::new(),
            early_names: HashMap::new(),
            held_order: VecDeque::new(),
            unknown_name: unknown_name.into(),
        }
    }

    pub fn local(&self) -> &PeerRecord {
        &self.local
    }

    pub fn set_local_name(&mut self, name: impl Into<String>) {
        self.local.display_name = name.into();
    }

    /// Add a peer to the connected set.
    ///
    /// Returns `true` if the peer was newly added, `false` if it was already
    /// connected (no state change) or is the local player.
    pub fn on_peer_join(&mut self, id: PeerId) -> bool {
        if id == self.local.id || self.is_connected(&id) {
            return false;
        }

        let name = self
            .take_held(&id)
            .unwrap_or_else(|| self.unknown_name.clone());
        debug!("Registry: peer {} joined as {:?}", id.short(), name);
        self.connected.push(PeerRecord::new(id, name));
        true
    }

    /// Drop a peer and its name. Returns `true` if the peer was connected.
    pub fn on_peer_leave(&mut self, id: &PeerId) -> bool {
        self.take_held(id);
        let before = self.connected.len();
        self.connected.retain(|record| &record.id != id);
        let removed = self.connected.len() != before;
        if removed {
            debug!("Registry: peer {} left", id.short());
        }
        removed
    }

    /// Current display name for `id`, or the placeholder when unresolved
    pub fn resolve_name(&self, id: &PeerId) -> String {
        if id == &self.local.id {
            return self.local.display_name.clone();
        }
        self.record(id)
            .map(|record| record.display_name.clone())
            .or_else(|| self.early_names.get(id).cloned())
            .unwrap_or_else(|| self.unknown_name.clone())
    }

    /// Create-or-update the display name for `id`.
    ///
    /// Returns `true` if a connected peer's visible name changed.
    pub fn set_name(&mut self, id: &PeerId, name: impl Into<String>) -> bool {
        let name = name.into();
        if id == &self.local.id {
            // Our own id echoed back; the local name is only set locally.
            return false;
        }

        match self.connected.iter_mut().find(|record| &record.id == id) {
            Some(record) => {
                if record.display_name == name {
                    return false;
                }
                record.display_name = name;
                true
            }
            None => {
                debug!("Registry: holding name {:?} for unjoined peer {}", name, id.short());
                self.hold(id, name);
                false
            }
        }
    }

    fn hold(&mut self, id: &PeerId, name: String) {
        if let Some(held) = self.early_names.get_mut(id) {
            *held = name;
            return;
        }
        if self.early_names.len() >= MAX_HELD_NAMES {
            if let Some(oldest) = self.held_order.pop_front() {
                self.early_names.remove(&oldest);
                debug!("Registry: evicted held name for {}", oldest.short());
            }
        }
        self.early_names.insert(id.clone(), name);
        self.held_order.push_back(id.clone());
    }

    fn take_held(&mut self, id: &PeerId) -> Option<String> {
        let name = self.early_names.remove(id)?;
        self.held_order.retain(|held| held != id);
        Some(name)
    }

    /// Names held for peers that are not connected
    pub fn held_name_count(&self) -> usize {
        self.early_names.len()
    }

    pub fn is_connected(&self, id: &PeerId) -> bool {
        self.connected.iter().any(|record| &record.id == id)
    }

    pub fn record(&self, id: &PeerId) -> Option<&PeerRecord> {
        self.connected.iter().find(|record| &record.id == id)
    }

    /// Connected peers in join order (excludes the local player)
    pub fn peers(&self) -> &[PeerRecord] {
        &self.connected
    }

    pub fn peer_count(&self) -> usize {
        self.connected.len()
    }

    pub fn unknown_name(&self) -> &str {
        &self.unknown_name
    }
}
