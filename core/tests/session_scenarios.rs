//! End-to-end session scenarios over the in-memory hub
//!
//! Each peer is a full `PeerSession`; `pump` delivers queued Transport events
//! to every session until the room is quiet.
//!
//! Run with: cargo test --test session_scenarios

use pixelworld_core::media::{MediaPhase, Medium, RecordingAudioOutput, SyntheticDevices};
use pixelworld_core::peer::PEER_NAME_KIND;
use pixelworld_core::transport::{RoomEvent, RoomEvents};
use pixelworld_core::{MediaCapabilities, MemoryHub, PeerId, PeerSession, SessionConfig, SessionError};
use std::sync::Arc;

struct Node {
    session: PeerSession,
    events: RoomEvents,
    devices: Arc<SyntheticDevices>,
    audio: RecordingAudioOutput,
}

async fn join_with(hub: &MemoryHub, id: &str, name: &str, devices: SyntheticDevices) -> Node {
    let devices = Arc::new(devices);
    let audio = RecordingAudioOutput::new();
    let caps = MediaCapabilities::new(devices.clone(), Arc::new(audio.clone()));
    let config = SessionConfig::default().with_display_name(name);
    let (session, events) = PeerSession::join(config, &hub.connector(PeerId::from(id)), caps)
        .await
        .expect("join");
    Node {
        session,
        events,
        devices,
        audio,
    }
}

async fn join(hub: &MemoryHub, id: &str, name: &str) -> Node {
    join_with(hub, id, name, SyntheticDevices::new()).await
}

/// Deliver queued events until no session has anything left to process
async fn pump(nodes: &mut [&mut Node]) {
    loop {
        let mut progressed = false;
        for node in nodes.iter_mut() {
            while let Ok(event) = node.events.try_recv() {
                node.session.handle_event(event).await;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
}

fn names(session: &PeerSession) -> Vec<(String, String)> {
    session.roster().names()
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[tokio::test]
async fn test_names_resolve_and_departure_is_cleaned_up() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    assert_eq!(names(&alice.session), vec![pair("self", "Alice")]);

    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(
        names(&alice.session),
        vec![pair("self", "Alice"), pair("p1", "Bob")]
    );
    assert_eq!(names(&bob.session), vec![pair("p1", "Bob"), pair("self", "Alice")]);

    // Each side announced exactly once
    let announced = |session: &PeerSession| {
        session
            .messages()
            .iter()
            .filter(|m| m.kind == PEER_NAME_KIND && &m.sender == session.self_id())
            .count()
    };
    assert_eq!(announced(&alice.session), 1);
    assert_eq!(announced(&bob.session), 1);

    bob.session.leave().await;
    pump(&mut [&mut alice]).await;
    assert_eq!(names(&alice.session), vec![pair("self", "Alice")]);
    assert!(!alice.session.video_streams().contains(&PeerId::from("p1")));
    assert!(!alice.session.audio_peers().contains(&PeerId::from("p1")));
}

#[tokio::test]
async fn test_rejoin_resets_name_until_reannounced() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    alice.session.on_peer_leave(&PeerId::from("p1"));
    alice.session.on_peer_join(PeerId::from("p1")).await;
    assert_eq!(alice.session.resolve_name(&PeerId::from("p1")), "Unknown Player");
}

#[tokio::test]
async fn test_three_peers_converge() {
    let hub = MemoryHub::new();
    let mut a = join(&hub, "a", "Ann").await;
    let mut b = join(&hub, "b", "Ben").await;
    pump(&mut [&mut a, &mut b]).await;
    let mut c = join(&hub, "c", "Cat").await;
    pump(&mut [&mut a, &mut b, &mut c]).await;

    for node in [&a, &b, &c] {
        let roster = node.session.roster();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.entries()[0].id, *node.session.self_id());
        for entry in roster.iter() {
            assert_ne!(entry.name, "Unknown Player", "{} unresolved", entry.id);
        }
    }
}

#[tokio::test]
async fn test_chat_round_trip() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    alice.session.send_chat("hi").await.unwrap();
    bob.session.send_chat("hey").await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    let history = bob.session.chat_history();
    let lines: Vec<(&str, &str)> = history
        .iter()
        .map(|line| (line.sender_name.as_str(), line.text.as_str()))
        .collect();
    assert_eq!(lines, vec![("Bob", "hey"), ("Alice", "hi")]);

    let alice_history = alice.session.chat_history();
    assert_eq!(alice_history.len(), 2);
    assert_eq!(alice_history[0].sender, PeerId::from("self"));
    assert_eq!(alice_history[1].sender, PeerId::from("p1"));
}

#[tokio::test]
async fn test_malformed_payload_is_dropped() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;
    let before = alice.session.messages().len();

    let config = SessionConfig::default();
    assert!(hub.inject(
        &config,
        &PeerId::from("self"),
        RoomEvent::Message {
            channel: config.channel.clone(),
            payload: "{not json".to_string(),
            sender: PeerId::from("p1"),
        },
    ));
    pump(&mut [&mut alice, &mut bob]).await;
    assert_eq!(alice.session.messages().len(), before);

    bob.session.send_chat("still here").await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert_eq!(alice.session.chat_history().len(), 1);
}

#[tokio::test]
async fn test_failed_send_keeps_local_echo() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    hub.set_send_failing(&PeerId::from("self"), true);
    let result = alice.session.send_chat("lost").await;
    assert!(matches!(result, Err(SessionError::SendFailure(_))));
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.session.chat_history().len(), 1);
    assert!(bob.session.chat_history().is_empty());
}

#[tokio::test]
async fn test_voice_failure_leaves_chat_usable() {
    let hub = MemoryHub::new();
    let mut alice = join_with(&hub, "self", "Alice", SyntheticDevices::denying(true, false)).await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    let result = alice.session.enable_voice().await;
    assert!(matches!(
        result,
        Err(SessionError::MediaAcquisition {
            medium: Medium::Voice,
            ..
        })
    ));
    assert_eq!(alice.session.voice_state().phase, MediaPhase::Disabled);

    let before = alice.session.voice_state();
    assert_eq!(alice.session.toggle_microphone(), Ok(false));
    assert_eq!(alice.session.voice_state(), before);

    // Video is independent
    alice.session.enable_video().await.unwrap();
    assert_eq!(alice.session.video_state().phase, MediaPhase::Enabled);

    alice.session.send_chat("no mic here").await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert_eq!(bob.session.chat_history()[0].text, "no mic here");
}

#[tokio::test]
async fn test_media_flows_and_is_dropped_on_leave() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    for node in [&alice, &bob] {
        node.session.enable_voice().await.unwrap();
        node.session.enable_video().await.unwrap();
    }
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.session.audio_peers(), vec![PeerId::from("p1")]);
    assert!(alice.session.video_streams().contains(&PeerId::from("p1")));
    assert!(alice.audio.sink_for(&PeerId::from("p1")).is_some());

    let mut streams_rx = alice.session.watch_video_streams();
    streams_rx.borrow_and_update();

    bob.session.leave().await;
    pump(&mut [&mut alice]).await;

    assert!(alice.session.audio_peers().is_empty());
    assert!(alice.session.video_streams().is_empty());
    assert!(alice.audio.sink_for(&PeerId::from("p1")).is_none());
    assert!(streams_rx.has_changed().unwrap());

    // Bob released his devices on leave
    assert!(bob.devices.captured().iter().all(|stream| !stream.is_live()));
    assert_eq!(bob.session.voice_state().phase, MediaPhase::Disabled);
}

#[tokio::test]
async fn test_late_joiner_receives_active_streams() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    alice.session.enable_voice().await.unwrap();

    let mut bob = join(&hub, "p1", "Bob").await;
    bob.session.enable_voice().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(bob.session.audio_peers(), vec![PeerId::from("self")]);
    assert_eq!(alice.session.audio_peers(), vec![PeerId::from("p1")]);
}

#[tokio::test]
async fn test_incoming_audio_gate_and_mic_mute() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    alice.session.enable_voice().await.unwrap();
    bob.session.enable_voice().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(alice.session.toggle_incoming_audio(false), Ok(true));
    assert!(alice.audio.sink_for(&PeerId::from("p1")).unwrap().muted);
    assert!(!alice.session.voice_state().incoming_audio_enabled);

    // Bob's sink of Alice is unaffected by Alice's playback gate
    assert!(!bob.audio.sink_for(&PeerId::from("self")).unwrap().muted);

    assert_eq!(alice.session.toggle_microphone(), Ok(true));
    assert!(alice.session.voice_state().microphone_muted);
    let local = alice.session.media().local_stream(Medium::Voice).unwrap();
    assert!(local.audio_tracks().all(|track| !track.is_enabled()));
    // Muting never re-acquires capture
    assert_eq!(alice.devices.request_count(), 1);
}

#[tokio::test]
async fn test_inbound_video_held_until_video_enabled() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    bob.session.enable_video().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    assert!(alice.session.video_streams().is_empty());

    alice.session.enable_video().await.unwrap();
    assert!(alice.session.video_streams().contains(&PeerId::from("p1")));
}

#[tokio::test]
async fn test_staggered_enable_is_two_way() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    alice.session.enable_voice().await.unwrap();
    alice.session.enable_video().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    bob.session.enable_voice().await.unwrap();
    bob.session.enable_video().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;

    assert_eq!(bob.session.audio_peers(), vec![PeerId::from("self")]);
    assert!(!bob.audio.sink_for(&PeerId::from("self")).unwrap().muted);
    assert!(bob.session.video_streams().contains(&PeerId::from("self")));
    assert_eq!(alice.session.audio_peers(), vec![PeerId::from("p1")]);
    assert!(alice.session.video_streams().contains(&PeerId::from("p1")));
}

#[tokio::test]
async fn test_stream_after_departure_is_dropped() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;
    alice.session.enable_voice().await.unwrap();
    alice.session.enable_video().await.unwrap();

    bob.session.enable_video().await.unwrap();
    let late = bob.session.media().local_stream(Medium::Video).unwrap();
    bob.session.leave().await;
    pump(&mut [&mut alice]).await;

    // The Transport hands over a stream for a peer that is already gone
    let config = SessionConfig::default();
    assert!(hub.inject(
        &config,
        &PeerId::from("self"),
        RoomEvent::PeerStream {
            peer: PeerId::from("p1"),
            stream: late,
        },
    ));
    pump(&mut [&mut alice]).await;

    assert!(alice.session.video_streams().is_empty());
    assert!(alice.session.audio_peers().is_empty());
    assert_eq!(names(&alice.session), vec![pair("self", "Alice")]);
}

#[tokio::test]
async fn test_remote_disable_clears_tiles_and_sinks() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;
    for node in [&alice, &bob] {
        node.session.enable_voice().await.unwrap();
        node.session.enable_video().await.unwrap();
    }
    pump(&mut [&mut alice, &mut bob]).await;
    assert!(alice.session.video_streams().contains(&PeerId::from("p1")));

    bob.session.disable_video().unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert!(alice.session.video_streams().is_empty());
    // Voice is untouched
    assert_eq!(alice.session.audio_peers(), vec![PeerId::from("p1")]);

    bob.session.disable_voice().unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert!(alice.session.audio_peers().is_empty());
    assert!(alice.audio.sink_for(&PeerId::from("p1")).is_none());

    // Re-enabling publishes a fresh stream
    bob.session.enable_video().await.unwrap();
    pump(&mut [&mut alice, &mut bob]).await;
    assert!(alice.session.video_streams().contains(&PeerId::from("p1")));
}

#[tokio::test]
async fn test_unreachable_transport_falls_back_offline() {
    let hub = MemoryHub::new();
    hub.set_available(false);
    let node = join(&hub, "self", "Alice").await;

    assert!(node.session.is_offline());
    assert_ne!(node.session.self_id(), &PeerId::from("self"));
    assert_eq!(node.session.roster().len(), 1);

    node.session.send_chat("anyone?").await.unwrap();
    assert_eq!(node.session.chat_history().len(), 1);
}

#[tokio::test]
async fn test_leave_closes_session() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    alice.session.leave().await;
    assert_eq!(hub.members(&SessionConfig::default()), vec![PeerId::from("p1")]);
    assert!(matches!(
        alice.session.enable_voice().await,
        Err(SessionError::Closed)
    ));

    pump(&mut [&mut alice, &mut bob]).await;
    assert_eq!(names(&bob.session), vec![pair("p1", "Bob")]);
}

#[tokio::test]
async fn test_roster_watchers_are_notified() {
    let hub = MemoryHub::new();
    let mut alice = join(&hub, "self", "Alice").await;
    let mut roster_rx = alice.session.watch_roster();
    let mut appended = alice.session.subscribe_messages();

    let mut bob = join(&hub, "p1", "Bob").await;
    pump(&mut [&mut alice, &mut bob]).await;

    assert!(roster_rx.has_changed().unwrap());
    assert_eq!(roster_rx.borrow_and_update().len(), 2);

    // Own announcement, then Bob's
    let first = appended.try_recv().unwrap();
    let second = appended.try_recv().unwrap();
    assert_eq!(first.sender, PeerId::from("self"));
    assert_eq!(second.sender, PeerId::from("p1"));
    assert_eq!(second.kind, PEER_NAME_KIND);
}
