// Peer stream registry — received video streams keyed by peer, for presentation

use super::stream::MediaStream;
use crate::peer::PeerId;

/// Received streams in arrival order, at most one per peer.
///
/// Published to observers as an immutable snapshot; every change produces a
/// new value so identity-based change detection always fires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerStreams {
    entries: Vec<(PeerId, MediaStream)>,
}

impl PeerStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the stream for `peer`; a replacement keeps its position
    pub fn insert(&mut self, peer: PeerId, stream: MediaStream) {
        match self.entries.iter_mut().find(|(id, _)| id == &peer) {
            Some(entry) => entry.1 = stream,
            None => self.entries.push((peer, stream)),
        }
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<MediaStream> {
        let index = self.entries.iter().position(|(id, _)| id == peer)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&MediaStream> {
        self.entries
            .iter()
            .find(|(id, _)| id == peer)
            .map(|(_, stream)| stream)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.get(peer).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &MediaStream)> {
        self.entries.iter().map(|(id, stream)| (id, stream))
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
