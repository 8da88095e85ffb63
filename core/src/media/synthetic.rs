//! Synthetic media capabilities for headless sessions (demo CLI, tests).
//!
//! `SyntheticDevices` hands out fresh synthetic tracks and can be told to deny
//! a device. `RecordingAudioOutput` records every sink it creates so callers
//! can inspect attachment, mute, and release.

use super::devices::{AudioOutput, AudioSink, CaptureError, MediaConstraints, MediaDevices};
use super::stream::{MediaStream, MediaTrack, TrackKind};
use crate::peer::PeerId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct SyntheticDevices {
    deny_audio: AtomicBool,
    deny_video: AtomicBool,
    requests: AtomicUsize,
    captured: Mutex<Vec<MediaStream>>,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices that refuse the microphone and/or the camera
    pub fn denying(audio: bool, video: bool) -> Self {
        let devices = Self::new();
        devices.set_deny_audio(audio);
        devices.set_deny_video(video);
        devices
    }

    pub fn set_deny_audio(&self, deny: bool) {
        self.deny_audio.store(deny, Ordering::SeqCst);
    }

    pub fn set_deny_video(&self, deny: bool) {
        self.deny_video.store(deny, Ordering::SeqCst);
    }

    /// Number of capture requests seen, including denied ones
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Every stream handed out so far
    pub fn captured(&self) -> Vec<MediaStream> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<MediaStream, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if (constraints.audio && self.deny_audio.load(Ordering::SeqCst))
            || (constraints.video && self.deny_video.load(Ordering::SeqCst))
        {
            return Err(CaptureError::PermissionDenied);
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, "synthetic microphone"));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(TrackKind::Video, "synthetic camera"));
        }
        if tracks.is_empty() {
            return Err(CaptureError::NotFound("no tracks requested".to_string()));
        }

        let stream = MediaStream::new(tracks);
        debug!("Synthetic capture {} ({} tracks)", stream.id(), stream.tracks().len());
        self.captured.lock().push(stream.clone());
        Ok(stream)
    }
}

/// What a `RecordingAudioOutput` sink has been through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub peer: PeerId,
    pub stream_id: String,
    pub muted: bool,
    pub released: bool,
}

#[derive(Clone, Default)]
pub struct RecordingAudioOutput {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl RecordingAudioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sink ever attached, in attachment order
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    /// Sinks not yet released
    pub fn active(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| !r.released)
            .cloned()
            .collect()
    }

    /// The live sink for `peer`, if any
    pub fn sink_for(&self, peer: &PeerId) -> Option<SinkRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .find(|r| &r.peer == peer && !r.released)
            .cloned()
    }
}

impl AudioOutput for RecordingAudioOutput {
    fn attach(&self, peer: &PeerId, stream: &MediaStream, muted: bool) -> Box<dyn AudioSink> {
        let mut records = self.records.lock();
        records.push(SinkRecord {
            peer: peer.clone(),
            stream_id: stream.id().to_string(),
            muted,
            released: false,
        });
        Box::new(RecordingSink {
            index: records.len() - 1,
            records: Arc::clone(&self.records),
        })
    }
}

struct RecordingSink {
    index: usize,
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl AudioSink for RecordingSink {
    fn set_muted(&mut self, muted: bool) {
        if let Some(record) = self.records.lock().get_mut(self.index) {
            record.muted = muted;
        }
    }

    fn is_muted(&self) -> bool {
        self.records
            .lock()
            .get(self.index)
            .map_or(true, |record| record.muted)
    }

    fn release(&mut self) {
        if let Some(record) = self.records.lock().get_mut(self.index) {
            record.released = true;
        }
    }
}
