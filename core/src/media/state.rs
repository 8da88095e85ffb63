// Media session state — per-medium tri-state plus voice sub-flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two independently enabled media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Medium {
    Voice,
    Video,
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Medium::Voice => write!(f, "voice"),
            Medium::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaPhase {
    #[default]
    Disabled,
    /// Capture requested, not yet settled
    Enabling,
    Enabled,
}

impl fmt::Display for MediaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaPhase::Disabled => write!(f, "disabled"),
            MediaPhase::Enabling => write!(f, "enabling"),
            MediaPhase::Enabled => write!(f, "enabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    pub phase: MediaPhase,
    /// Local audio tracks are disabled (remote peers hear silence)
    pub microphone_muted: bool,
    /// Peer audio sinks are playing
    pub incoming_audio_enabled: bool,
}

impl Default for VoiceState {
    fn default() -> Self {
        Self {
            phase: MediaPhase::Disabled,
            microphone_muted: false,
            incoming_audio_enabled: true,
        }
    }
}

impl VoiceState {
    pub fn is_enabled(&self) -> bool {
        self.phase == MediaPhase::Enabled
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoState {
    pub phase: MediaPhase,
}

impl VideoState {
    pub fn is_enabled(&self) -> bool {
        self.phase == MediaPhase::Enabled
    }
}
