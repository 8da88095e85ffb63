// Session configuration — which room to join and how to present ourselves

use crate::SessionError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_ID: &str = "no.brainbox.pixelworld";
pub const DEFAULT_ROOM: &str = "main-room";
pub const DEFAULT_CHANNEL: &str = "message";
pub const DEFAULT_UNKNOWN_PEER_NAME: &str = "Unknown Player";

/// A STUN/TURN server handed to the Transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Application namespace shared by all peers of this game
    pub app_id: String,

    /// Room name within the application namespace
    pub room: String,

    /// Broadcast channel carrying application messages
    pub channel: String,

    /// Local display name; generated when absent
    pub display_name: Option<String>,

    /// Name shown for peers that have not announced one
    pub unknown_peer_name: String,

    /// Signaling relay endpoints (Transport-specific)
    pub relay_urls: Vec<String>,

    /// STUN/TURN servers for connectivity
    pub ice_servers: Vec<IceServer>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            room: DEFAULT_ROOM.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            display_name: None,
            unknown_peer_name: DEFAULT_UNKNOWN_PEER_NAME.to_string(),
            relay_urls: Vec::new(),
            ice_servers: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check the config before joining
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.app_id.trim().is_empty() {
            return Err(SessionError::InvalidInput("app_id must not be empty".into()));
        }
        if self.room.trim().is_empty() {
            return Err(SessionError::InvalidInput("room must not be empty".into()));
        }
        if self.channel.trim().is_empty() {
            return Err(SessionError::InvalidInput("channel must not be empty".into()));
        }
        if let Some(server) = self.ice_servers.iter().find(|s| s.urls.is_empty()) {
            return Err(SessionError::InvalidInput(format!(
                "ice server without urls (username {:?})",
                server.username
            )));
        }
        Ok(())
    }

    /// Configured display name, or a generated `Player-xxxx`
    pub fn resolve_display_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("Player-{}", &suffix[..4])
            }
        }
    }
}
