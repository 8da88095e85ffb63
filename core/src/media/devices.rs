//! Platform media capabilities the core depends on but does not implement:
//! capture (camera/microphone) and audio playback of peer streams.

use super::stream::MediaStream;
use crate::peer::PeerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which devices a capture request wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Microphone only
    pub const VOICE: Self = Self {
        audio: true,
        video: false,
    };

    /// Camera only
    pub const VIDEO: Self = Self {
        audio: false,
        video: true,
    };
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("No device: {0}")]
    NotFound(String),

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// Local capture capability (a browser's `getUserMedia`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, CaptureError>;
}

/// Playback of one peer's audio
pub trait AudioSink: Send {
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    /// Stop playback and detach from the stream
    fn release(&mut self);
}

/// Creates audio sinks for inbound peer streams
pub trait AudioOutput: Send + Sync {
    fn attach(&self, peer: &PeerId, stream: &MediaStream, muted: bool) -> Box<dyn AudioSink>;
}
