// Peer module — identities, the connected-peer registry, and the derived roster

pub mod names;
pub mod registry;
pub mod roster;

pub use names::{announcement, parse_announcement, PEER_NAME_KIND};
pub use registry::{PeerRecord, PeerRegistry};
pub use roster::{project, PresenceProjector, Roster, RosterEntry};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque peer identifier assigned by the Transport.
///
/// Stable for the lifetime of a connection and never reused while that
/// peer remains connected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random id (used by in-process transports)
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string()[..20].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
