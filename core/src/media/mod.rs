// Media module — capture, streams, and the voice/video session manager

pub mod devices;
pub mod registry;
pub mod session;
pub mod state;
pub mod stream;
pub mod synthetic;

pub use devices::{AudioOutput, AudioSink, CaptureError, MediaConstraints, MediaDevices};
pub use registry::PeerStreams;
pub use session::MediaSessionManager;
pub use state::{MediaPhase, Medium, VideoState, VoiceState};
pub use stream::{MediaStream, MediaTrack, TrackKind};
pub use synthetic::{RecordingAudioOutput, SinkRecord, SyntheticDevices};
