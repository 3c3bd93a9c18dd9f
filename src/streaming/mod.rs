//! Streaming sessions against the VocalBridge audio-bridge service.
//!
//! This module owns the session side of the client: wire protocol types,
//! credentials and endpoint URLs, the 200 ms chunk encoder, the session
//! state machine, and the WebSocket runtime that drives it.
//!
//! # Architecture
//!
//! ```text
//! AudioSource ──▶ ChunkEncoder (200ms) ──▶ SessionMachine ──▶ WebSocket
//!                                               │
//!                                               ▼
//!                                      InboundEvent receiver
//!                                  (transcripts, facts, control)
//! ```
//!
//! The machine is a pure reducer; the runtime in [`session`] feeds it
//! transport and encoder events and executes the actions it returns. There
//! is deliberately no reconnect or retry layer: a dropped transport is
//! logged and surfaced to the caller, nothing more.

pub mod aggregator;
pub mod chunker;
pub mod credentials;
pub mod machine;
pub mod protocol;
pub mod session;

pub use aggregator::TranscriptAggregator;
pub use chunker::{encode_pcm16le, spawn_encoder, EncoderConfig, CHUNK_DURATION_MS};
pub use credentials::{Credentials, Endpoint, SERVICE_DOMAIN};
pub use machine::{Action, SessionEvent, SessionMachine, SessionState};
pub use protocol::{
    end_message, DictationConfig, Evidence, FactData, InboundEvent, InteractionConfig,
    OutputMode, Participant, SessionConfig, TranscriptData, VoiceCommand,
};
pub use session::{ClosePolicy, EventReceiver, Session};

/// Errors that can occur while starting or running a streaming session.
#[derive(Debug, Clone)]
pub enum StreamingError {
    /// A required credential variable is missing from the environment.
    MissingCredential(&'static str),
    /// The audio source has no track to stream.
    MissingAudioTrack,
    /// The supplied configuration belongs to the other endpoint family.
    ConfigMismatch(&'static str),
    /// Failed to establish the WebSocket connection.
    ConnectionFailed(String),
    /// Failed to serialize an outbound message.
    ProtocolError(String),
}

impl std::fmt::Display for StreamingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamingError::MissingCredential(name) => {
                write!(f, "Missing credential: set the {} environment variable", name)
            }
            StreamingError::MissingAudioTrack => {
                write!(f, "Audio source has no audio track")
            }
            StreamingError::ConfigMismatch(family) => {
                write!(f, "Configuration does not match the {} endpoint", family)
            }
            StreamingError::ConnectionFailed(e) => {
                write!(f, "Failed to connect to the audio bridge: {}", e)
            }
            StreamingError::ProtocolError(e) => {
                write!(f, "Protocol error: {}", e)
            }
        }
    }
}

impl std::error::Error for StreamingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_error_display() {
        let err = StreamingError::MissingCredential("VOCALBRIDGE_TOKEN");
        assert!(err.to_string().contains("VOCALBRIDGE_TOKEN"));

        let err = StreamingError::ConnectionFailed("timeout".to_string());
        assert!(err.to_string().contains("timeout"));

        let err = StreamingError::ConfigMismatch("dictation");
        assert!(err.to_string().contains("dictation"));
    }
}
