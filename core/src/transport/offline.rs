// Offline room — stands in when no connectivity path could be established.
//
// Sends succeed locally and reach nobody; the event feed is already closed.

use super::abstraction::{JoinedRoom, Room, TransportError};
use crate::media::MediaStream;
use crate::peer::PeerId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct OfflineRoom {
    id: PeerId,
}

impl OfflineRoom {
    pub fn new(id: PeerId) -> Self {
        Self { id }
    }

    /// An offline room with a closed event feed
    pub fn joined(id: PeerId) -> JoinedRoom {
        let (_tx, events) = mpsc::unbounded_channel();
        JoinedRoom {
            room: Arc::new(Self::new(id)),
            events,
        }
    }
}

#[async_trait]
impl Room for OfflineRoom {
    fn self_id(&self) -> &PeerId {
        &self.id
    }

    async fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        debug!("Offline: dropping {} bytes on {}", payload.len(), channel);
        Ok(())
    }

    fn add_stream(&self, _stream: &MediaStream, _target: Option<&PeerId>) -> Result<(), TransportError> {
        Ok(())
    }

    fn remove_stream(&self, _stream: &MediaStream, _target: Option<&PeerId>) -> Result<(), TransportError> {
        Ok(())
    }

    async fn leave(&self) {}
}
