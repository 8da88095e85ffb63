// Media streams — handles to captured or received audio/video tracks
//
// Tracks are shared handles: the capture side, the Transport, and any sink
// all observe the same enabled/ended flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: AtomicBool,
    ended: AtomicBool,
}

/// A single audio or video track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                label: label.into(),
                enabled: AtomicBool::new(true),
                ended: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the track currently carries media (false = muted at source)
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stop the track permanently, releasing the capture device
    pub fn stop(&self) {
        self.inner.ended.store(true, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        !self.inner.ended.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}

/// A bundle of tracks published or received as a unit
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks().next().is_some()
    }

    /// Stop every track in the stream
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }
}

impl PartialEq for MediaStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaStream {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_flags_are_shared_between_clones() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        let clone = track.clone();
        clone.set_enabled(false);
        assert!(!track.is_enabled());
        track.stop();
        assert!(!clone.is_live());
    }

    #[test]
    fn test_stream_classification() {
        let stream = MediaStream::new(vec![
            MediaTrack::new(TrackKind::Audio, "mic"),
            MediaTrack::new(TrackKind::Video, "cam"),
        ]);
        assert!(stream.has_audio());
        assert!(stream.has_video());
        assert_eq!(stream.audio_tracks().count(), 1);

        let audio_only = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "mic")]);
        assert!(!audio_only.has_video());
    }

    #[test]
    fn test_stop_ends_all_tracks() {
        let stream = MediaStream::new(vec![
            MediaTrack::new(TrackKind::Audio, "mic"),
            MediaTrack::new(TrackKind::Video, "cam"),
        ]);
        assert!(stream.is_live());
        stream.stop();
        assert!(!stream.is_live());
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
    }

    #[test]
    fn test_stream_identity() {
        let a = MediaStream::new(vec![]);
        let b = MediaStream::new(vec![]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
