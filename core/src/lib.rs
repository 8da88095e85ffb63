// PixelWorld Core — Peer Session Coordinator
//
// Everything between a peer-to-peer room and the screen: who is here and
// what they are called, the shared message log, and whether voice and video
// are on. Signaling and NAT traversal stay behind the Transport.

pub mod config;
pub mod media;
pub mod message;
pub mod peer;
pub mod session;
pub mod transport;

use thiserror::Error;

pub use config::{IceServer, SessionConfig};
pub use media::{
    CaptureError, MediaDevices, MediaPhase, MediaStream, MediaTrack, Medium, PeerStreams, TrackKind,
    VideoState, VoiceState,
};
pub use message::{ChatLine, CodecError, LogSnapshot, Message, CHAT_KIND};
pub use peer::{PeerId, PeerRecord, Roster, RosterEntry, PEER_NAME_KIND};
pub use session::{MediaCapabilities, PeerSession};
pub use transport::{MemoryHub, Room, RoomConnector, RoomEvent, TransportError};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Failures surfaced by the session. None of them is fatal: each degrades one
/// feature (one medium, one message) and leaves roster and log intact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Could not acquire {medium}: {reason}")]
    MediaAcquisition { medium: Medium, reason: String },

    #[error("Send failed: {0}")]
    SendFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session closed")]
    Closed,
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable(reason) => SessionError::TransportUnavailable(reason),
            TransportError::SendFailed(reason) | TransportError::PublishFailed(reason) => {
                SessionError::SendFailure(reason)
            }
            TransportError::Closed => SessionError::Closed,
        }
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        SessionError::MalformedMessage(err.to_string())
    }
}
