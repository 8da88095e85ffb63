//! Property tests for roster invariants under arbitrary join/leave/name sequences
//!
//! Run with: cargo test --test roster_properties

use pixelworld_core::media::{MediaStream, MediaTrack, TrackKind};
use pixelworld_core::peer::{project, PeerRecord, PeerRegistry};
use pixelworld_core::transport::OfflineRoom;
use pixelworld_core::{MediaCapabilities, PeerId, PeerSession, SessionConfig};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const UNKNOWN: &str = "Unknown Player";

#[derive(Debug, Clone)]
enum Op {
    Join(u8),
    Leave(u8),
    Name(u8, String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Join),
        (0u8..6).prop_map(Op::Leave),
        (0u8..6, "[A-Za-z]{1,8}").prop_map(|(peer, name)| Op::Name(peer, name)),
    ]
}

fn peer(n: u8) -> PeerId {
    PeerId::new(format!("peer-{}", n))
}

/// Reference model: connected peers in join order plus names held for absent peers
#[derive(Default)]
struct Model {
    connected: Vec<(PeerId, String)>,
    held: HashMap<PeerId, String>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::Join(n) => {
                let id = peer(*n);
                if !self.connected.iter().any(|(p, _)| p == &id) {
                    let name = self.held.remove(&id).unwrap_or_else(|| UNKNOWN.to_string());
                    self.connected.push((id, name));
                }
            }
            Op::Leave(n) => {
                let id = peer(*n);
                self.held.remove(&id);
                self.connected.retain(|(p, _)| p != &id);
            }
            Op::Name(n, name) => {
                let id = peer(*n);
                match self.connected.iter_mut().find(|(p, _)| p == &id) {
                    Some(entry) => entry.1 = name.clone(),
                    None => {
                        self.held.insert(id, name.clone());
                    }
                }
            }
        }
    }
}

fn registry() -> PeerRegistry {
    PeerRegistry::new(PeerRecord::new(PeerId::from("self"), "Me"), UNKNOWN)
}

fn apply(registry: &mut PeerRegistry, op: &Op) {
    match op {
        Op::Join(n) => {
            registry.on_peer_join(peer(*n));
        }
        Op::Leave(n) => {
            registry.on_peer_leave(&peer(*n));
        }
        Op::Name(n, name) => {
            registry.set_name(&peer(*n), name.clone());
        }
    }
}

proptest! {
    #[test]
    fn roster_starts_with_self_and_tracks_connected_peers(ops in prop::collection::vec(op(), 0..64)) {
        let mut registry = registry();
        let mut model = Model::default();

        for op in &ops {
            apply(&mut registry, op);
            model.apply(op);

            let roster = project(&registry);
            prop_assert_eq!(&roster.entries()[0].id, &PeerId::from("self"));
            prop_assert!(roster.entries()[0].is_self);
            prop_assert_eq!(roster.len(), 1 + registry.peer_count());

            let mut ids: Vec<&PeerId> = roster.iter().map(|e| &e.id).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), roster.len());

            let expected: Vec<(PeerId, String)> = model.connected.clone();
            let actual: Vec<(PeerId, String)> = roster
                .iter()
                .skip(1)
                .map(|e| (e.id.clone(), e.name.clone()))
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn join_is_idempotent(ops in prop::collection::vec(op(), 0..32), n in 0u8..6) {
        let mut once = registry();
        let mut twice = registry();
        for op in &ops {
            apply(&mut once, op);
            apply(&mut twice, op);
        }

        once.on_peer_join(peer(n));
        twice.on_peer_join(peer(n));
        twice.on_peer_join(peer(n));
        prop_assert_eq!(project(&once), project(&twice));
    }

    #[test]
    fn rejoin_resets_name(name in "[A-Za-z]{1,8}", n in 0u8..6) {
        let mut registry = registry();
        registry.on_peer_join(peer(n));
        registry.set_name(&peer(n), name);
        registry.on_peer_leave(&peer(n));
        registry.on_peer_join(peer(n));
        prop_assert_eq!(registry.resolve_name(&peer(n)), UNKNOWN);
    }

    #[test]
    fn departed_peers_vanish_from_every_projection(ops in prop::collection::vec(op(), 0..40)) {
        let session = PeerSession::new(
            SessionConfig::default().with_display_name("Me"),
            Arc::new(OfflineRoom::new(PeerId::from("self"))),
            MediaCapabilities::synthetic(),
        )
        .unwrap();
        tokio_test::block_on(session.enable_video()).unwrap();

        for op in &ops {
            match op {
                Op::Join(n) => {
                    tokio_test::block_on(session.on_peer_join(peer(*n)));
                    let video = MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "cam")]);
                    session.media().on_peer_stream(&peer(*n), video);
                }
                Op::Leave(n) => session.on_peer_leave(&peer(*n)),
                Op::Name(n, name) => {
                    let raw = format!(r#"{{"type":"peer-name","data":{{"name":"{}"}}}}"#, name);
                    session.receive(&raw, peer(*n)).unwrap();
                }
            }

            let connected: Vec<PeerId> = session.peers().into_iter().map(|r| r.id).collect();
            let roster = session.roster();
            prop_assert_eq!(roster.len(), 1 + connected.len());
            let streams = session.video_streams();
            for (id, _) in streams.iter() {
                prop_assert!(connected.contains(id));
            }
        }
    }
}
