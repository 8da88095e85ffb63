//! Transport abstraction layer
//!
//! The contract this core consumes from a peer-to-peer room primitive:
//! lifecycle events, a named broadcast channel, and media stream exchange.
//! Signaling, ICE, and relay traversal all live behind it.

use crate::config::SessionConfig;
use crate::media::MediaStream;
use crate::peer::PeerId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Events from the Transport, delivered in the order the Transport observed them
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A peer connected to the room
    PeerJoined { peer: PeerId },
    /// A peer disconnected from the room
    PeerLeft { peer: PeerId },
    /// Text received on a named broadcast channel
    Message {
        channel: String,
        payload: String,
        sender: PeerId,
    },
    /// A peer started sending media
    PeerStream { peer: PeerId, stream: MediaStream },
    /// A peer stopped sending the stream with this id
    PeerStreamEnded { peer: PeerId, stream_id: String },
    /// Transport encountered an error
    TransportError { error: String },
}

impl fmt::Display for RoomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomEvent::PeerJoined { peer } => write!(f, "PeerJoined {{ peer: {} }}", peer.short()),
            RoomEvent::PeerLeft { peer } => write!(f, "PeerLeft {{ peer: {} }}", peer.short()),
            RoomEvent::Message {
                channel,
                payload,
                sender,
            } => write!(
                f,
                "Message {{ channel: {}, sender: {}, payload_len: {} }}",
                channel,
                sender.short(),
                payload.len()
            ),
            RoomEvent::PeerStream { peer, stream } => write!(
                f,
                "PeerStream {{ peer: {}, tracks: {} }}",
                peer.short(),
                stream.tracks().len()
            ),
            RoomEvent::PeerStreamEnded { peer, stream_id } => write!(
                f,
                "PeerStreamEnded {{ peer: {}, stream: {} }}",
                peer.short(),
                stream_id
            ),
            RoomEvent::TransportError { error } => write!(f, "TransportError {{ error: {} }}", error),
        }
    }
}

/// Receiving half of a room's event feed
pub type RoomEvents = mpsc::UnboundedReceiver<RoomEvent>;

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not available: {0}")]
    Unavailable(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Stream publication failed: {0}")]
    PublishFailed(String),

    #[error("Room closed")]
    Closed,
}

/// Membership in a joined room
#[async_trait]
pub trait Room: Send + Sync {
    /// Id the Transport assigned to the local peer
    fn self_id(&self) -> &PeerId;

    /// Best-effort broadcast of `payload` to every current peer on `channel`
    async fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Publish a local stream to one peer, or to all current peers when `target` is `None`
    fn add_stream(&self, stream: &MediaStream, target: Option<&PeerId>) -> Result<(), TransportError>;

    /// Stop publishing a local stream; receivers observe `PeerStreamEnded`
    fn remove_stream(&self, stream: &MediaStream, target: Option<&PeerId>) -> Result<(), TransportError>;

    /// Leave the room; remote peers observe `PeerLeft`
    async fn leave(&self);
}

/// A joined room together with its event feed
pub struct JoinedRoom {
    pub room: Arc<dyn Room>,
    pub events: RoomEvents,
}

/// Entry point of a Transport: joins the room named by the session config
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn join(&self, config: &SessionConfig) -> Result<JoinedRoom, TransportError>;
}
