//! End-to-end scenario tests over the merge utility, the chunk encoder,
//! and the session state machine with a simulated transport.
//!
//! These exercise the contract a live session must honor: the
//! configuration is the first frame after open, no audio precedes the
//! accept, chunks produced against a closed transport are dropped, and the
//! end frame is sent only while the transport is open.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vocalbridge::streaming::{
    end_message, spawn_encoder, Action, EncoderConfig, SessionEvent, SessionMachine,
};
use vocalbridge::{merge, AudioSource, InboundEvent, InteractionConfig, SessionConfig, SyntheticSource};

const ACCEPTED: &str = r#"{"type":"CONFIG_ACCEPTED"}"#;

/// A frame that would have gone out on the wire.
#[derive(Debug, PartialEq)]
enum Sent {
    Text(String),
    Binary(Vec<u8>),
}

/// Execute send/forward actions against the simulated transport, returning
/// the control actions (encoder start/stop, close) for inspection.
fn apply(actions: Vec<Action>, sent: &mut Vec<Sent>, received: &mut Vec<InboundEvent>) -> Vec<Action> {
    let mut control = Vec::new();
    for action in actions {
        match action {
            Action::SendText(text) => sent.push(Sent::Text(text)),
            Action::SendBinary(data) => sent.push(Sent::Binary(data)),
            Action::Forward(event) => received.push(event),
            other => control.push(other),
        }
    }
    control
}

fn constant_source(sample_rate: u32, value: i16, duration_ms: u64) -> AudioSource {
    let mut synth = SyntheticSource::new(sample_rate);
    synth.generate_constant(value, duration_ms);
    synth.into_source(100)
}

fn interaction_machine() -> SessionMachine {
    let config = SessionConfig::Interaction(InteractionConfig::default());
    SessionMachine::new(config.to_message().unwrap())
}

/// Two sources, merged, streamed with the default config: exactly one
/// config send, then the two 200 ms binary chunks in order, then the end
/// frame.
#[tokio::test]
async fn merged_session_sends_config_then_audio_then_end() {
    let sources = vec![
        constant_source(1000, 11, 400),
        constant_source(1000, 22, 400),
    ];
    let (merged, mut teardown) = merge(sources).unwrap();
    assert_eq!(merged.channels(), 2);
    let track = merged.into_source().into_first_track().unwrap();

    let mut machine = interaction_machine();
    let mut sent = Vec::new();
    let mut received = Vec::new();

    // Transport opens: the configuration must be the very first frame.
    apply(machine.handle(SessionEvent::TransportOpen), &mut sent, &mut received);
    assert_eq!(sent.len(), 1);

    // A chunk produced before the accept never reaches the wire.
    apply(
        machine.handle(SessionEvent::Chunk(vec![0; 4])),
        &mut sent,
        &mut received,
    );
    assert_eq!(sent.len(), 1);

    // The service accepts; the encoder starts, exactly once.
    let control = apply(
        machine.handle(SessionEvent::TransportText(ACCEPTED.to_string())),
        &mut sent,
        &mut received,
    );
    assert_eq!(control, vec![Action::StartEncoder]);

    let (chunk_tx, mut chunk_rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let encoder = spawn_encoder(track, EncoderConfig::for_track(1000, 2), chunk_tx, token);

    // 400 ms of 2-channel audio at 1000 Hz is exactly two 200 ms chunks.
    while let Some(chunk) = chunk_rx.recv().await {
        apply(
            machine.handle(SessionEvent::Chunk(chunk)),
            &mut sent,
            &mut received,
        );
    }
    encoder.await.unwrap();

    let control = apply(machine.handle(SessionEvent::Stop), &mut sent, &mut received);
    assert_eq!(control, vec![Action::StopEncoder, Action::CloseTransport]);

    assert_eq!(sent.len(), 4);
    assert!(matches!(&sent[0], Sent::Text(t) if t.contains("\"config\"")));
    match (&sent[1], &sent[2]) {
        (Sent::Binary(first), Sent::Binary(second)) => {
            // 200 ms * 1000 Hz * 2 channels * 2 bytes
            assert_eq!(first.len(), 800);
            assert_eq!(second.len(), 800);
            // Channel mapping survives to the wire: each frame is
            // (source 0, source 1) in little-endian PCM16.
            assert_eq!(&first[..4], &[11, 0, 22, 0]);
            assert_eq!(&second[second.len() - 4..], &[11, 0, 22, 0]);
        }
        other => panic!("expected two binary frames, got {:?}", other),
    }
    assert_eq!(sent[3], Sent::Text(end_message()));

    assert_eq!(received, vec![InboundEvent::ConfigAccepted]);
    teardown.teardown();
}

/// Malformed inbound JSON reaches neither the caller nor the wire, and a
/// well-formed message right after it is processed normally.
#[tokio::test]
async fn malformed_inbound_never_reaches_the_caller() {
    let mut machine = interaction_machine();
    let mut sent = Vec::new();
    let mut received = Vec::new();

    apply(machine.handle(SessionEvent::TransportOpen), &mut sent, &mut received);

    apply(
        machine.handle(SessionEvent::TransportText("{truncated".to_string())),
        &mut sent,
        &mut received,
    );
    apply(
        machine.handle(SessionEvent::TransportText(r#"[1,2,3]"#.to_string())),
        &mut sent,
        &mut received,
    );
    assert!(received.is_empty());

    let fact = r#"{
        "type": "fact",
        "data": { "id": "f1", "text": "still alive" }
    }"#;
    apply(
        machine.handle(SessionEvent::TransportText(fact.to_string())),
        &mut sent,
        &mut received,
    );

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].fact().unwrap().text, "still alive");
}

/// Inbound events are forwarded whatever the session state, including
/// before the accept.
#[tokio::test]
async fn events_before_accept_are_still_forwarded() {
    let mut machine = interaction_machine();
    let mut sent = Vec::new();
    let mut received = Vec::new();

    apply(machine.handle(SessionEvent::TransportOpen), &mut sent, &mut received);

    let transcript = r#"{
        "type": "transcript",
        "data": {
            "id": "u1",
            "text": "early bird",
            "participant": { "channel": 0, "role": "AGENT" }
        }
    }"#;
    apply(
        machine.handle(SessionEvent::TransportText(transcript.to_string())),
        &mut sent,
        &mut received,
    );

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].transcript().unwrap().text, "early bird");
    // But no audio may flow yet.
    assert_eq!(sent.len(), 1);
}

/// A chunk produced after the transport closed mid-stream is dropped, and
/// the subsequent stop does not attempt an end frame.
#[tokio::test]
async fn chunks_against_a_closed_transport_are_dropped() {
    let mut machine = interaction_machine();
    let mut sent = Vec::new();
    let mut received = Vec::new();

    apply(machine.handle(SessionEvent::TransportOpen), &mut sent, &mut received);
    apply(
        machine.handle(SessionEvent::TransportText(ACCEPTED.to_string())),
        &mut sent,
        &mut received,
    );

    apply(
        machine.handle(SessionEvent::Chunk(vec![1, 2])),
        &mut sent,
        &mut received,
    );
    assert_eq!(sent.len(), 2); // config + one chunk

    machine.handle(SessionEvent::TransportClosed);
    apply(
        machine.handle(SessionEvent::Chunk(vec![3, 4])),
        &mut sent,
        &mut received,
    );
    assert_eq!(sent.len(), 2); // dropped, not queued

    let control = apply(machine.handle(SessionEvent::Stop), &mut sent, &mut received);
    // Encoder still needs stopping, but no end frame on a dead transport.
    assert_eq!(control, vec![Action::StopEncoder, Action::CloseTransport]);
    assert_eq!(sent.len(), 2);
}
