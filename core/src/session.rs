// Peer Session Coordinator — owns the registry, message log, and media state
//
// One session per joined room. Transport events are applied in delivery
// order through `handle_event`; presentation reads reactive projections and
// issues commands, never touching state directly.

use crate::config::SessionConfig;
use crate::media::{
    AudioOutput, MediaDevices, MediaSessionManager, PeerStreams, RecordingAudioOutput, SyntheticDevices,
    VideoState, VoiceState,
};
use crate::message::{ChatLine, LogSnapshot, Message, MessageBus, CHAT_KIND};
use crate::peer::{
    announcement, parse_announcement, PeerId, PeerRecord, PeerRegistry, PresenceProjector, Roster,
    PEER_NAME_KIND,
};
use crate::transport::{OfflineRoom, Room, RoomConnector, RoomEvent, RoomEvents};
use crate::SessionError;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Platform media capabilities handed to a session
#[derive(Clone)]
pub struct MediaCapabilities {
    pub devices: Arc<dyn MediaDevices>,
    pub audio: Arc<dyn AudioOutput>,
}

impl MediaCapabilities {
    pub fn new(devices: Arc<dyn MediaDevices>, audio: Arc<dyn AudioOutput>) -> Self {
        Self { devices, audio }
    }

    /// Synthetic capture and a recording audio output, for headless sessions
    pub fn synthetic() -> Self {
        Self {
            devices: Arc::new(SyntheticDevices::new()),
            audio: Arc::new(RecordingAudioOutput::new()),
        }
    }
}

struct SessionInner {
    config: SessionConfig,
    room: Arc<dyn Room>,
    registry: RwLock<PeerRegistry>,
    presence: PresenceProjector,
    bus: MessageBus,
    media: MediaSessionManager,
    offline: bool,
    closed: AtomicBool,
}

/// Handle to a joined session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct PeerSession {
    inner: Arc<SessionInner>,
}

impl PeerSession {
    /// Build a session over an already joined room
    pub fn new(config: SessionConfig, room: Arc<dyn Room>, caps: MediaCapabilities) -> Result<Self, SessionError> {
        Self::build(config, room, caps, false)
    }

    fn build(
        config: SessionConfig,
        room: Arc<dyn Room>,
        caps: MediaCapabilities,
        offline: bool,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let local = PeerRecord::new(room.self_id().clone(), config.resolve_display_name());
        let registry = PeerRegistry::new(local, config.unknown_peer_name.clone());
        let presence = PresenceProjector::new(&registry);
        let bus = MessageBus::new(Arc::clone(&room), config.channel.clone());
        let media = MediaSessionManager::new(Arc::clone(&room), caps.devices, caps.audio);

        info!(
            "Session: {} as {:?} in {}/{}{}",
            room.self_id().short(),
            registry.local().display_name,
            config.app_id,
            config.room,
            if offline { " (offline)" } else { "" }
        );

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                room,
                registry: RwLock::new(registry),
                presence,
                bus,
                media,
                offline,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Join the configured room through `connector`.
    ///
    /// When the Transport cannot establish connectivity the session starts
    /// offline instead: no peers, sends succeed locally, roster and chat keep
    /// working. Only an invalid config is returned as an error.
    pub async fn join(
        config: SessionConfig,
        connector: &dyn RoomConnector,
        caps: MediaCapabilities,
    ) -> Result<(Self, RoomEvents), SessionError> {
        config.validate()?;

        let (joined, offline) = match connector.join(&config).await {
            Ok(joined) => (joined, false),
            Err(e) => {
                warn!("Session: {}, continuing offline", SessionError::from(e));
                (OfflineRoom::joined(PeerId::random()), true)
            }
        };

        let session = Self::build(config, joined.room, caps, offline)?;
        Ok((session, joined.events))
    }

    /// Apply Transport events until the feed closes or the session is left
    pub async fn run(&self, mut events: RoomEvents) {
        while let Some(event) = events.recv().await {
            if self.is_closed() {
                break;
            }
            self.handle_event(event).await;
        }
        debug!("Session: event feed ended");
    }

    /// Apply one Transport event
    pub async fn handle_event(&self, event: RoomEvent) {
        if self.is_closed() {
            debug!("Session: ignoring {} after leave", event);
            return;
        }
        debug!("Session: event {}", event);

        match event {
            RoomEvent::PeerJoined { peer } => self.on_peer_join(peer).await,
            RoomEvent::PeerLeft { peer } => self.on_peer_leave(&peer),
            RoomEvent::Message {
                channel,
                payload,
                sender,
            } => {
                if channel != self.inner.config.channel {
                    debug!("Session: ignoring traffic on channel {:?}", channel);
                    return;
                }
                // Malformed payloads are logged by the bus and dropped
                let _ = self.receive(&payload, sender);
            }
            RoomEvent::PeerStream { peer, stream } => {
                if !self.inner.registry.read().is_connected(&peer) {
                    debug!("Session: ignoring stream from unconnected {}", peer.short());
                    return;
                }
                self.inner.media.on_peer_stream(&peer, stream)
            }
            RoomEvent::PeerStreamEnded { peer, stream_id } => {
                self.inner.media.on_peer_stream_ended(&peer, &stream_id)
            }
            RoomEvent::TransportError { error } => warn!("Session: transport error: {}", error),
        }
    }

    /// A peer connected: record it, publish local media to it, announce our name
    pub async fn on_peer_join(&self, peer: PeerId) {
        if &peer == self.self_id() {
            debug!("Session: ignoring join for local id");
            return;
        }

        let added = {
            let mut registry = self.inner.registry.write();
            let added = registry.on_peer_join(peer.clone());
            if added {
                self.inner.presence.recompute(&registry);
            }
            added
        };
        if !added {
            return;
        }

        info!("Session: {} joined", peer.short());
        self.inner.media.on_peer_join(&peer);
        if let Err(e) = self.announce().await {
            warn!("Session: name announcement failed: {}", e);
        }
    }

    /// A peer disconnected: drop it from the roster and from every media projection
    pub fn on_peer_leave(&self, peer: &PeerId) {
        let removed = {
            let mut registry = self.inner.registry.write();
            let removed = registry.on_peer_leave(peer);
            if removed {
                self.inner.presence.recompute(&registry);
            }
            removed
        };
        self.inner.media.on_peer_leave(peer);

        if removed {
            info!("Session: {} left", peer.short());
        }
    }

    /// Decode and record an inbound payload, applying name announcements
    pub fn receive(&self, raw: &str, sender: PeerId) -> Result<Message, SessionError> {
        let message = self.inner.bus.receive(raw, sender)?;

        if let Some(name) = parse_announcement(&message) {
            let mut registry = self.inner.registry.write();
            if registry.set_name(&message.sender, name) {
                self.inner.presence.recompute(&registry);
                debug!("Session: {} is now {:?}", message.sender.short(), name);
            }
        }
        Ok(message)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Broadcast a chat line. The local echo is recorded even if the broadcast fails.
    pub async fn send_chat(&self, text: &str) -> Result<Message, SessionError> {
        self.ensure_open()?;
        if text.trim().is_empty() {
            return Err(SessionError::InvalidInput("chat text is empty".into()));
        }
        self.inner.bus.send(CHAT_KIND, json!({ "text": text })).await
    }

    /// Broadcast our display name to every current peer
    pub async fn announce(&self) -> Result<Message, SessionError> {
        self.ensure_open()?;
        let name = self.display_name();
        self.inner
            .bus
            .send(PEER_NAME_KIND, announcement(&name))
            .await
    }

    /// Rename the local player and re-announce
    pub async fn set_display_name(&self, name: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidInput("display name is empty".into()));
        }

        {
            let mut registry = self.inner.registry.write();
            registry.set_local_name(name);
            self.inner.presence.recompute(&registry);
        }
        info!("Session: renamed to {:?}", name);
        self.announce().await.map(|_| ())
    }

    pub async fn enable_voice(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.media.enable_voice().await
    }

    pub fn disable_voice(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.media.disable_voice();
        Ok(())
    }

    /// Returns whether the mic state changed (`false` unless voice is enabled)
    pub fn toggle_microphone(&self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.inner.media.toggle_microphone())
    }

    /// Returns whether the gate changed (`false` unless voice is enabled)
    pub fn toggle_incoming_audio(&self, enabled: bool) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.inner.media.toggle_incoming_audio(enabled))
    }

    pub async fn enable_video(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.media.enable_video().await
    }

    pub fn disable_video(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.media.disable_video();
        Ok(())
    }

    /// Tear down: release capture devices and sinks, then leave the room
    pub async fn leave(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.media.shutdown();
        self.inner.room.leave().await;
        info!("Session: left {}/{}", self.inner.config.app_id, self.inner.config.room);
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn self_id(&self) -> &PeerId {
        self.inner.room.self_id()
    }

    pub fn display_name(&self) -> String {
        self.inner.registry.read().local().display_name.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// True when the session fell back to an offline room
    pub fn is_offline(&self) -> bool {
        self.inner.offline
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn resolve_name(&self, id: &PeerId) -> String {
        self.inner.registry.read().resolve_name(id)
    }

    /// Connected peers in join order
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.inner.registry.read().peers().to_vec()
    }

    pub fn roster(&self) -> Roster {
        self.inner.presence.current()
    }

    pub fn watch_roster(&self) -> watch::Receiver<Roster> {
        self.inner.presence.subscribe()
    }

    /// Snapshot of the full message log, protocol messages included
    pub fn messages(&self) -> LogSnapshot {
        self.inner.bus.log()
    }

    pub fn watch_messages(&self) -> watch::Receiver<LogSnapshot> {
        self.inner.bus.watch()
    }

    /// Each message as it is appended
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.inner.bus.subscribe()
    }

    /// Chat lines with sender names resolved as of now
    pub fn chat_history(&self) -> Vec<ChatLine> {
        let log = self.inner.bus.log();
        let registry = self.inner.registry.read();
        log.iter()
            .filter_map(|message| {
                message.chat_text().map(|text| ChatLine {
                    sender: message.sender.clone(),
                    sender_name: registry.resolve_name(&message.sender),
                    text: text.to_string(),
                    timestamp: message.timestamp,
                })
            })
            .collect()
    }

    pub fn voice_state(&self) -> VoiceState {
        self.inner.media.voice_state()
    }

    pub fn watch_voice(&self) -> watch::Receiver<VoiceState> {
        self.inner.media.watch_voice()
    }

    pub fn video_state(&self) -> VideoState {
        self.inner.media.video_state()
    }

    pub fn watch_video(&self) -> watch::Receiver<VideoState> {
        self.inner.media.watch_video()
    }

    pub fn video_streams(&self) -> Arc<PeerStreams> {
        self.inner.media.video_streams()
    }

    pub fn watch_video_streams(&self) -> watch::Receiver<Arc<PeerStreams>> {
        self.inner.media.watch_video_streams()
    }

    /// Peers whose audio is currently attached to a sink
    pub fn audio_peers(&self) -> Vec<PeerId> {
        self.inner.media.audio_peers()
    }

    pub fn media(&self) -> &MediaSessionManager {
        &self.inner.media
    }
}
