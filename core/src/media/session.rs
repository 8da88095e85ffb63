//! Media Session Manager — voice and video state machines.
//!
//! Each medium moves `disabled → enabling → enabled` and back to `disabled`.
//! Capture acquisition is the only suspension point. A disable issued while
//! a capture is in flight wins: the capture is allowed to settle, then its
//! stream is stopped and discarded. Every enable and disable bumps the
//! medium's epoch, and a settling capture only applies if the epoch it
//! started under is still current.
//!
//! Streams peers send are held whether or not the local medium is on, so
//! enabling a medium later still plays what peers published earlier. A
//! held stream is dropped when its peer ends it or leaves.
//!
//! Mic mute and the incoming-audio gate are pure flags over existing tracks
//! and sinks; toggling them never re-acquires or renegotiates a stream.

use super::devices::{AudioOutput, AudioSink, MediaConstraints, MediaDevices};
use super::registry::PeerStreams;
use super::state::{MediaPhase, Medium, VideoState, VoiceState};
use super::stream::MediaStream;
use crate::peer::PeerId;
use crate::transport::Room;
use crate::SessionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct MediaInner {
    voice: VoiceState,
    video: VideoState,
    voice_epoch: u64,
    video_epoch: u64,
    local_voice: Option<MediaStream>,
    local_video: Option<MediaStream>,
    /// Latest stream each peer sent, per medium, attached or not
    inbound_audio: PeerStreams,
    inbound_video: PeerStreams,
    audio_sinks: HashMap<PeerId, Box<dyn AudioSink>>,
    video_streams: PeerStreams,
}

impl MediaInner {
    fn phase(&self, medium: Medium) -> MediaPhase {
        match medium {
            Medium::Voice => self.voice.phase,
            Medium::Video => self.video.phase,
        }
    }

    fn set_phase(&mut self, medium: Medium, phase: MediaPhase) {
        match medium {
            Medium::Voice => self.voice.phase = phase,
            Medium::Video => self.video.phase = phase,
        }
    }

    fn epoch(&self, medium: Medium) -> u64 {
        match medium {
            Medium::Voice => self.voice_epoch,
            Medium::Video => self.video_epoch,
        }
    }

    fn bump_epoch(&mut self, medium: Medium) -> u64 {
        let epoch = match medium {
            Medium::Voice => &mut self.voice_epoch,
            Medium::Video => &mut self.video_epoch,
        };
        *epoch += 1;
        *epoch
    }

    fn take_local(&mut self, medium: Medium) -> Option<MediaStream> {
        match medium {
            Medium::Voice => self.local_voice.take(),
            Medium::Video => self.local_video.take(),
        }
    }
}

pub struct MediaSessionManager {
    room: Arc<dyn Room>,
    devices: Arc<dyn MediaDevices>,
    audio_output: Arc<dyn AudioOutput>,
    inner: Mutex<MediaInner>,
    voice_tx: watch::Sender<VoiceState>,
    video_tx: watch::Sender<VideoState>,
    streams_tx: watch::Sender<Arc<PeerStreams>>,
}

impl MediaSessionManager {
    pub fn new(
        room: Arc<dyn Room>,
        devices: Arc<dyn MediaDevices>,
        audio_output: Arc<dyn AudioOutput>,
    ) -> Self {
        let (voice_tx, _) = watch::channel(VoiceState::default());
        let (video_tx, _) = watch::channel(VideoState::default());
        let (streams_tx, _) = watch::channel(Arc::new(PeerStreams::new()));
        Self {
            room,
            devices,
            audio_output,
            inner: Mutex::new(MediaInner {
                voice: VoiceState::default(),
                video: VideoState::default(),
                voice_epoch: 0,
                video_epoch: 0,
                local_voice: None,
                local_video: None,
                inbound_audio: PeerStreams::new(),
                inbound_video: PeerStreams::new(),
                audio_sinks: HashMap::new(),
                video_streams: PeerStreams::new(),
            }),
            voice_tx,
            video_tx,
            streams_tx,
        }
    }

    fn publish(&self, inner: &MediaInner, medium: Medium) {
        match medium {
            Medium::Voice => {
                self.voice_tx.send_replace(inner.voice);
            }
            Medium::Video => {
                self.video_tx.send_replace(inner.video);
            }
        }
    }

    fn publish_streams(&self, inner: &MediaInner) {
        self.streams_tx
            .send_replace(Arc::new(inner.video_streams.clone()));
    }

    fn attach_audio(&self, inner: &mut MediaInner, peer: &PeerId, stream: &MediaStream) {
        let muted = !inner.voice.incoming_audio_enabled;
        let sink = self.audio_output.attach(peer, stream, muted);
        if let Some(mut previous) = inner.audio_sinks.insert(peer.clone(), sink) {
            previous.release();
        }
        debug!("Media: attached audio from {}", peer.short());
    }

    /// Attach every held stream of `medium` that is not attached yet
    fn attach_held(&self, inner: &mut MediaInner, medium: Medium) {
        match medium {
            Medium::Voice => {
                let pending: Vec<(PeerId, MediaStream)> = inner
                    .inbound_audio
                    .iter()
                    .filter(|(peer, _)| !inner.audio_sinks.contains_key(*peer))
                    .map(|(peer, stream)| (peer.clone(), stream.clone()))
                    .collect();
                for (peer, stream) in pending {
                    self.attach_audio(inner, &peer, &stream);
                }
            }
            Medium::Video => {
                let pending: Vec<(PeerId, MediaStream)> = inner
                    .inbound_video
                    .iter()
                    .filter(|(peer, _)| !inner.video_streams.contains(*peer))
                    .map(|(peer, stream)| (peer.clone(), stream.clone()))
                    .collect();
                if pending.is_empty() {
                    return;
                }
                for (peer, stream) in pending {
                    debug!("Media: registered held video from {}", peer.short());
                    inner.video_streams.insert(peer, stream);
                }
                self.publish_streams(inner);
            }
        }
    }

    /// Detach inbound media of `medium`; held streams stay for a later enable
    fn release_inbound(&self, inner: &mut MediaInner, medium: Medium) {
        match medium {
            Medium::Voice => {
                for (peer, mut sink) in inner.audio_sinks.drain() {
                    debug!("Media: releasing audio sink for {}", peer.short());
                    sink.release();
                }
            }
            Medium::Video => {
                if !inner.video_streams.is_empty() {
                    inner.video_streams.clear();
                    self.publish_streams(inner);
                }
            }
        }
    }

    pub async fn enable_voice(&self) -> Result<(), SessionError> {
        self.enable(Medium::Voice).await
    }

    pub fn disable_voice(&self) {
        self.disable(Medium::Voice);
    }

    pub async fn enable_video(&self) -> Result<(), SessionError> {
        self.enable(Medium::Video).await
    }

    pub fn disable_video(&self) {
        self.disable(Medium::Video);
    }

    /// Acquire capture for `medium` and publish it to every peer.
    ///
    /// No-op unless the medium is disabled. A capture failure returns the
    /// medium to `disabled` and reports `MediaAcquisition`. A capture that
    /// settles after a disable is discarded and reported as success.
    pub async fn enable(&self, medium: Medium) -> Result<(), SessionError> {
        let epoch = {
            let mut inner = self.inner.lock();
            let phase = inner.phase(medium);
            if phase != MediaPhase::Disabled {
                debug!("Media: enable {} ignored, already {}", medium, phase);
                return Ok(());
            }
            let epoch = inner.bump_epoch(medium);
            inner.set_phase(medium, MediaPhase::Enabling);
            self.publish(&inner, medium);
            self.attach_held(&mut inner, medium);
            epoch
        };

        info!("Media: enabling {}", medium);
        let constraints = match medium {
            Medium::Voice => MediaConstraints::VOICE,
            Medium::Video => MediaConstraints::VIDEO,
        };
        let captured = self.devices.get_user_media(constraints).await;

        let mut inner = self.inner.lock();
        if inner.epoch(medium) != epoch || inner.phase(medium) != MediaPhase::Enabling {
            if let Ok(stream) = captured {
                stream.stop();
            }
            info!("Media: {} capture settled after cancellation, discarded", medium);
            return Ok(());
        }

        let stream = match captured {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Media: {} capture failed: {}", medium, e);
                self.release_inbound(&mut inner, medium);
                inner.set_phase(medium, MediaPhase::Disabled);
                self.publish(&inner, medium);
                return Err(SessionError::MediaAcquisition {
                    medium,
                    reason: e.to_string(),
                });
            }
        };

        if let Err(e) = self.room.add_stream(&stream, None) {
            warn!("Media: publishing {} stream failed: {}", medium, e);
        }

        match medium {
            Medium::Voice => {
                inner.local_voice = Some(stream);
                inner.voice = VoiceState {
                    phase: MediaPhase::Enabled,
                    microphone_muted: false,
                    incoming_audio_enabled: true,
                };
                for sink in inner.audio_sinks.values_mut() {
                    sink.set_muted(false);
                }
            }
            Medium::Video => {
                inner.local_video = Some(stream);
                inner.video.phase = MediaPhase::Enabled;
            }
        }
        self.publish(&inner, medium);
        info!("Media: {} enabled", medium);
        Ok(())
    }

    /// Stop capture, unpublish, release inbound media; always ends `disabled`
    pub fn disable(&self, medium: Medium) {
        let mut inner = self.inner.lock();
        let previous = inner.phase(medium);
        inner.bump_epoch(medium);

        if let Some(stream) = inner.take_local(medium) {
            stream.stop();
            if let Err(e) = self.room.remove_stream(&stream, None) {
                warn!("Media: unpublishing {} stream failed: {}", medium, e);
            }
        }
        self.release_inbound(&mut inner, medium);

        match medium {
            Medium::Voice => inner.voice = VoiceState::default(),
            Medium::Video => inner.video = VideoState::default(),
        }
        self.publish(&inner, medium);

        if previous != MediaPhase::Disabled {
            info!("Media: {} disabled (was {})", medium, previous);
        }
    }

    /// Flip local mic mute. Returns `false` (no-op) unless voice is enabled.
    pub fn toggle_microphone(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.voice.is_enabled() {
            debug!("Media: mic toggle ignored, voice {}", inner.voice.phase);
            return false;
        }

        let muted = !inner.voice.microphone_muted;
        if let Some(stream) = &inner.local_voice {
            for track in stream.audio_tracks() {
                track.set_enabled(!muted);
            }
        }
        inner.voice.microphone_muted = muted;
        self.publish(&inner, Medium::Voice);
        debug!("Media: microphone {}", if muted { "muted" } else { "live" });
        true
    }

    /// Gate playback of every peer's audio. Returns `false` (no-op) unless voice is enabled.
    pub fn toggle_incoming_audio(&self, enabled: bool) -> bool {
        let mut inner = self.inner.lock();
        if !inner.voice.is_enabled() {
            debug!("Media: incoming audio toggle ignored, voice {}", inner.voice.phase);
            return false;
        }

        for sink in inner.audio_sinks.values_mut() {
            sink.set_muted(!enabled);
        }
        inner.voice.incoming_audio_enabled = enabled;
        self.publish(&inner, Medium::Voice);
        debug!("Media: incoming audio {}", if enabled { "on" } else { "off" });
        true
    }

    /// Route a stream a peer started sending.
    ///
    /// The stream is always held. Audio goes to a sink keyed by the peer and
    /// video into the stream registry, each only while its medium is enabling
    /// or enabled; otherwise it waits for the next enable.
    pub fn on_peer_stream(&self, peer: &PeerId, stream: MediaStream) {
        let mut inner = self.inner.lock();

        if stream.has_audio() {
            inner.inbound_audio.insert(peer.clone(), stream.clone());
            if inner.voice.phase != MediaPhase::Disabled {
                self.attach_audio(&mut inner, peer, &stream);
            } else {
                debug!("Media: holding audio from {}, voice disabled", peer.short());
            }
        }

        if stream.has_video() {
            inner.inbound_video.insert(peer.clone(), stream.clone());
            if inner.video.phase != MediaPhase::Disabled {
                inner.video_streams.insert(peer.clone(), stream);
                self.publish_streams(&inner);
                debug!("Media: registered video from {}", peer.short());
            } else {
                debug!("Media: holding video from {}, video disabled", peer.short());
            }
        }
    }

    /// A peer stopped sending `stream_id`: detach and forget it.
    /// An id that no longer matches the peer's latest stream is ignored.
    pub fn on_peer_stream_ended(&self, peer: &PeerId, stream_id: &str) {
        let mut inner = self.inner.lock();
        let is_current = |streams: &PeerStreams| streams.get(peer).map_or(false, |s| s.id() == stream_id);

        if is_current(&inner.inbound_audio) {
            inner.inbound_audio.remove(peer);
            if let Some(mut sink) = inner.audio_sinks.remove(peer) {
                sink.release();
            }
            debug!("Media: audio from {} ended", peer.short());
        }

        if is_current(&inner.inbound_video) {
            inner.inbound_video.remove(peer);
            if inner.video_streams.remove(peer).is_some() {
                self.publish_streams(&inner);
            }
            debug!("Media: video from {} ended", peer.short());
        }
    }

    /// Publish active local streams to a newly joined peer
    pub fn on_peer_join(&self, peer: &PeerId) {
        let inner = self.inner.lock();
        for stream in [inner.local_voice.as_ref(), inner.local_video.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.room.add_stream(stream, Some(peer)) {
                warn!("Media: publishing to {} failed: {}", peer.short(), e);
            }
        }
    }

    /// Drop everything received from a departed peer
    pub fn on_peer_leave(&self, peer: &PeerId) {
        let mut inner = self.inner.lock();
        inner.inbound_audio.remove(peer);
        inner.inbound_video.remove(peer);
        if let Some(mut sink) = inner.audio_sinks.remove(peer) {
            sink.release();
            debug!("Media: released audio sink for departed {}", peer.short());
        }
        if inner.video_streams.remove(peer).is_some() {
            self.publish_streams(&inner);
            debug!("Media: dropped video of departed {}", peer.short());
        }
    }

    /// Release all capture devices and sinks
    pub fn shutdown(&self) {
        self.disable(Medium::Voice);
        self.disable(Medium::Video);
        let mut inner = self.inner.lock();
        inner.inbound_audio.clear();
        inner.inbound_video.clear();
    }

    pub fn voice_state(&self) -> VoiceState {
        self.inner.lock().voice
    }

    pub fn video_state(&self) -> VideoState {
        self.inner.lock().video
    }

    pub fn watch_voice(&self) -> watch::Receiver<VoiceState> {
        self.voice_tx.subscribe()
    }

    pub fn watch_video(&self) -> watch::Receiver<VideoState> {
        self.video_tx.subscribe()
    }

    pub fn video_streams(&self) -> Arc<PeerStreams> {
        Arc::clone(&*self.streams_tx.borrow())
    }

    pub fn watch_video_streams(&self) -> watch::Receiver<Arc<PeerStreams>> {
        self.streams_tx.subscribe()
    }

    /// Peers with an attached audio sink
    pub fn audio_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.lock().audio_sinks.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn local_stream(&self, medium: Medium) -> Option<MediaStream> {
        let inner = self.inner.lock();
        match medium {
            Medium::Voice => inner.local_voice.clone(),
            Medium::Video => inner.local_video.clone(),
        }
    }
}
