//! # vocalbridge
//!
//! Streaming client for the VocalBridge audio-bridge transcription API.
//!
//! The crate does two things:
//!
//! - **Merge**: map N independent audio sources onto the N channels of one
//!   stream, one source per channel, with an explicit teardown handle.
//! - **Stream**: open a WebSocket session against the interaction or
//!   dictation endpoint, perform the configuration handshake, forward
//!   200 ms PCM16 chunks once the service accepts, and demultiplex inbound
//!   transcript and fact events to the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vocalbridge::{
//!     merge, Credentials, DeviceCapture, Endpoint, Session,
//! };
//!
//! let capture = DeviceCapture::new()?;
//! let (mic_handle, mic) = capture.start()?;
//! let (merged, mut teardown) = merge(vec![mic, remote_party])?;
//!
//! let credentials = Credentials::from_env()?;
//! let (session, mut events) = Session::start(
//!     merged.into_source(),
//!     &credentials,
//!     Endpoint::interaction("int-42"),
//!     None, // default configuration
//! )
//! .await?;
//!
//! while let Some(event) = events.recv().await {
//!     // transcripts, facts, control events
//! }
//!
//! session.stop().await;
//! teardown.teardown();
//! mic_handle.stop();
//! ```
//!
//! There is no reconnect, retry, or backoff in this crate; callers who
//! need resilience layer it around the session rather than inside it.

pub mod audio;
pub mod streaming;

pub use audio::{
    merge, AudioSource, AudioTrack, CaptureError, CaptureHandle, DeviceCapture, MergeTeardown,
    MergedStream, SampleBlock, SyntheticSource, TrackProducer, ValidationError,
};
pub use streaming::{
    ClosePolicy, Credentials, DictationConfig, Endpoint, EventReceiver, InboundEvent,
    InteractionConfig, OutputMode, Participant, Session, SessionConfig, StreamingError,
    TranscriptAggregator, VoiceCommand,
};
