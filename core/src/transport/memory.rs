//! In-memory hub transport
//!
//! Every member of a hub room runs in the same process. Semantics follow a
//! mesh room: a joining peer and the existing peers each learn of the other,
//! broadcasts reach every other member, and streams go to all current
//! members or to one target. Used by the demo CLI and by tests, which can
//! also make a member's sends fail or make the whole hub unreachable.

use super::abstraction::{JoinedRoom, Room, RoomConnector, RoomEvent, RoomEvents, TransportError};
use crate::config::SessionConfig;
use crate::media::MediaStream;
use crate::peer::PeerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

struct Member {
    id: PeerId,
    events: mpsc::UnboundedSender<RoomEvent>,
    failing_sends: bool,
}

struct HubState {
    available: bool,
    /// Members per `app_id/room`, in join order
    rooms: HashMap<String, Vec<Member>>,
}

fn room_key(config: &SessionConfig) -> String {
    format!("{}/{}", config.app_id, config.room)
}

/// Shared rendezvous point for in-process peers
#[derive(Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                available: true,
                rooms: HashMap::new(),
            })),
        }
    }

    /// Connector that joins as `id`
    pub fn connector(&self, id: PeerId) -> MemoryConnector {
        MemoryConnector {
            hub: self.clone(),
            id,
        }
    }

    /// Join the configured room as `id`
    pub fn join_as(
        &self,
        id: PeerId,
        config: &SessionConfig,
    ) -> Result<(Arc<MemoryRoom>, RoomEvents), TransportError> {
        let key = room_key(config);
        let mut state = self.state.lock();
        if !state.available {
            return Err(TransportError::Unavailable("hub unreachable".to_string()));
        }

        let members = state.rooms.entry(key.clone()).or_default();
        if members.iter().any(|m| m.id == id) {
            return Err(TransportError::Unavailable(format!(
                "peer {} already in room",
                id.short()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for existing in members.iter() {
            let _ = existing.events.send(RoomEvent::PeerJoined { peer: id.clone() });
            let _ = tx.send(RoomEvent::PeerJoined {
                peer: existing.id.clone(),
            });
        }
        members.push(Member {
            id: id.clone(),
            events: tx,
            failing_sends: false,
        });
        info!("Hub: {} joined {} ({} members)", id.short(), key, members.len());

        let room = Arc::new(MemoryRoom {
            state: Arc::clone(&self.state),
            key,
            id,
        });
        Ok((room, rx))
    }

    /// Make the hub reachable or unreachable for new joins and sends
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Make every send from `id` fail (broadcasts are not delivered)
    pub fn set_send_failing(&self, id: &PeerId, failing: bool) {
        let mut state = self.state.lock();
        for members in state.rooms.values_mut() {
            for member in members.iter_mut().filter(|m| &m.id == id) {
                member.failing_sends = failing;
            }
        }
    }

    /// Current members of the configured room, in join order
    pub fn members(&self, config: &SessionConfig) -> Vec<PeerId> {
        let state = self.state.lock();
        state
            .rooms
            .get(&room_key(config))
            .map(|members| members.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliver a raw event to one member, bypassing the room semantics
    pub fn inject(&self, config: &SessionConfig, to: &PeerId, event: RoomEvent) -> bool {
        let state = self.state.lock();
        state
            .rooms
            .get(&room_key(config))
            .and_then(|members| members.iter().find(|m| &m.id == to))
            .map(|member| member.events.send(event).is_ok())
            .unwrap_or(false)
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A member's handle on a hub room
pub struct MemoryRoom {
    state: Arc<Mutex<HubState>>,
    key: String,
    id: PeerId,
}

impl MemoryRoom {
    fn deliver(
        &self,
        target: Option<&PeerId>,
        event: impl Fn() -> RoomEvent,
    ) -> Result<usize, TransportError> {
        let state = self.state.lock();
        if !state.available {
            return Err(TransportError::Unavailable("hub unreachable".to_string()));
        }
        let members = state.rooms.get(&self.key).ok_or(TransportError::Closed)?;
        let me = members
            .iter()
            .find(|m| m.id == self.id)
            .ok_or(TransportError::Closed)?;
        if me.failing_sends {
            return Err(TransportError::SendFailed("delivery refused".to_string()));
        }

        let mut delivered = 0;
        for member in members.iter().filter(|m| m.id != self.id) {
            if target.map_or(true, |t| t == &member.id) && member.events.send(event()).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl Room for MemoryRoom {
    fn self_id(&self) -> &PeerId {
        &self.id
    }

    async fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        let delivered = self.deliver(None, || RoomEvent::Message {
            channel: channel.to_string(),
            payload: payload.to_string(),
            sender: self.id.clone(),
        })?;
        debug!("Hub: {} broadcast on {} to {} peers", self.id.short(), channel, delivered);
        Ok(())
    }

    fn add_stream(&self, stream: &MediaStream, target: Option<&PeerId>) -> Result<(), TransportError> {
        let delivered = self
            .deliver(target, || RoomEvent::PeerStream {
                peer: self.id.clone(),
                stream: stream.clone(),
            })
            .map_err(|e| match e {
                TransportError::SendFailed(reason) => TransportError::PublishFailed(reason),
                other => other,
            })?;
        if target.is_some() && delivered == 0 {
            return Err(TransportError::PublishFailed("target not in room".to_string()));
        }
        debug!("Hub: {} published stream to {} peers", self.id.short(), delivered);
        Ok(())
    }

    fn remove_stream(&self, stream: &MediaStream, target: Option<&PeerId>) -> Result<(), TransportError> {
        let delivered = self
            .deliver(target, || RoomEvent::PeerStreamEnded {
                peer: self.id.clone(),
                stream_id: stream.id().to_string(),
            })
            .map_err(|e| match e {
                TransportError::SendFailed(reason) => TransportError::PublishFailed(reason),
                other => other,
            })?;
        debug!(
            "Hub: {} unpublished stream {} from {} peers",
            self.id.short(),
            stream.id(),
            delivered
        );
        Ok(())
    }

    async fn leave(&self) {
        let mut state = self.state.lock();
        let Some(members) = state.rooms.get_mut(&self.key) else {
            return;
        };
        let before = members.len();
        members.retain(|m| m.id != self.id);
        if members.len() == before {
            return;
        }
        for member in members.iter() {
            let _ = member.events.send(RoomEvent::PeerLeft {
                peer: self.id.clone(),
            });
        }
        info!("Hub: {} left {}", self.id.short(), self.key);
        if members.is_empty() {
            state.rooms.remove(&self.key);
        }
    }
}

/// `RoomConnector` joining a hub under a fixed id
pub struct MemoryConnector {
    hub: MemoryHub,
    id: PeerId,
}

#[async_trait]
impl RoomConnector for MemoryConnector {
    async fn join(&self, config: &SessionConfig) -> Result<JoinedRoom, TransportError> {
        let (room, events) = self.hub.join_as(self.id.clone(), config)?;
        Ok(JoinedRoom { room, events })
    }
}
