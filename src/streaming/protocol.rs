//! VocalBridge audio-bridge wire protocol types.
//!
//! This module defines the JSON message types exchanged with the
//! audio-bridge service over WebSocket.
//!
//! # Protocol Overview
//!
//! 1. Connect to the interaction or dictation endpoint (see
//!    [`Endpoint`](crate::streaming::credentials::Endpoint))
//! 2. Send the configuration message as the first frame
//! 3. Wait for the `CONFIG_ACCEPTED` control event
//! 4. Stream raw PCM16 audio as binary frames
//! 5. Receive `transcript` and `fact` events
//! 6. Send `{"type":"end"}` and close
//!
//! The two endpoint families use structurally different configuration
//! payloads AND different envelope shapes on the wire; both shapes are
//! preserved exactly and never unified.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A (channel, role) pair telling the service which fixed role owns a
/// given audio channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// 0-based channel index in the streamed audio.
    pub channel: u16,
    /// Role name, e.g. `"AGENT"` or `"CUSTOMER"`.
    pub role: String,
}

impl Participant {
    pub fn new(channel: u16, role: impl Into<String>) -> Self {
        Self {
            channel,
            role: role.into(),
        }
    }
}

/// What the service should produce for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputMode {
    /// Transcript events only.
    Transcripts,
    /// Fact events only.
    Facts,
    /// Both transcripts and facts.
    All,
}

/// Configuration for the multi-party interaction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionConfig {
    /// Primary language of the audio, e.g. `"en-US"`.
    pub language: String,

    /// Infer speakers within a channel.
    pub diarization: bool,

    /// Treat each channel as a separate, pre-assigned speaker.
    pub multichannel: bool,

    /// Ordered channel-to-role mappings.
    pub participants: Vec<Participant>,

    /// What the service should emit.
    pub output_mode: OutputMode,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            diarization: false,
            multichannel: true,
            participants: vec![
                Participant::new(0, "AGENT"),
                Participant::new(1, "CUSTOMER"),
            ],
            output_mode: OutputMode::All,
        }
    }
}

/// A spoken command the dictation endpoint should recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    /// Exact phrase to match.
    pub phrase: String,
    /// Action tag reported back when the phrase is heard.
    pub action: String,
    /// Keywords that may trigger the command in looser matches.
    pub keywords: Vec<String>,
}

/// Configuration for the dictation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationConfig {
    /// Language of the dictated audio.
    pub language: String,

    /// Emit interim (non-final) results while the speaker is talking.
    pub interim_results: bool,

    /// Insert punctuation automatically.
    pub punctuation: bool,

    /// Capitalize sentence starts and proper nouns.
    pub capitalization: bool,

    /// Model identifier, e.g. `"general"`.
    pub model: String,

    /// Voice commands to recognize, in priority order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<VoiceCommand>>,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            interim_results: true,
            punctuation: true,
            capitalization: true,
            model: "general".to_string(),
            commands: None,
        }
    }
}

/// The effective session configuration, tagged by endpoint family.
///
/// The two variants serialize to different wire envelopes; see
/// [`SessionConfig::to_message`].
#[derive(Debug, Clone)]
pub enum SessionConfig {
    Interaction(InteractionConfig),
    Dictation(DictationConfig),
}

/// Dictation envelope: `type` top-level, config nested under
/// `configuration`.
#[derive(Serialize)]
struct DictationEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    configuration: &'a DictationConfig,
}

/// Interaction envelope: `type` nested inside `configuration`, config
/// fields flattened beside it.
#[derive(Serialize)]
struct InteractionEnvelope<'a> {
    configuration: InteractionBody<'a>,
}

#[derive(Serialize)]
struct InteractionBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    config: &'a InteractionConfig,
}

impl SessionConfig {
    /// Serialize the configuration to its variant's exact wire shape.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        match self {
            SessionConfig::Dictation(config) => serde_json::to_string(&DictationEnvelope {
                kind: "config",
                configuration: config,
            }),
            SessionConfig::Interaction(config) => serde_json::to_string(&InteractionEnvelope {
                configuration: InteractionBody {
                    kind: "config",
                    config,
                },
            }),
        }
    }

    /// Short name of the endpoint family this configuration belongs to.
    pub fn family(&self) -> &'static str {
        match self {
            SessionConfig::Interaction(_) => "interaction",
            SessionConfig::Dictation(_) => "dictation",
        }
    }
}

/// The final outbound control message.
pub fn end_message() -> String {
    serde_json::json!({ "type": "end" }).to_string()
}

// ============================================================================
// Inbound events (received FROM the service)
// ============================================================================

/// Events received from the audio-bridge service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// The service accepted the configuration; audio may flow.
    #[serde(rename = "CONFIG_ACCEPTED")]
    ConfigAccepted,

    /// A transcribed utterance, interim or final.
    #[serde(rename = "transcript")]
    Transcript { data: TranscriptData },

    /// A structured fact extracted from the conversation.
    #[serde(rename = "fact")]
    Fact { data: FactData },

    /// Catch-all for event types this client does not handle.
    /// Prevents deserialization failures for unknown types.
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    /// Whether this is the configuration acknowledgment.
    pub fn is_config_accepted(&self) -> bool {
        matches!(self, InboundEvent::ConfigAccepted)
    }

    /// Extract transcript data if this is a transcript event.
    pub fn transcript(&self) -> Option<&TranscriptData> {
        match self {
            InboundEvent::Transcript { data } => Some(data),
            _ => None,
        }
    }

    /// Extract fact data if this is a fact event.
    pub fn fact(&self) -> Option<&FactData> {
        match self {
            InboundEvent::Fact { data } => Some(data),
            _ => None,
        }
    }
}

/// Payload of a `transcript` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptData {
    /// Utterance identifier; interim and final results for the same
    /// utterance share it.
    pub id: String,

    /// Transcribed text.
    pub text: String,

    /// Whether this is the final result for the utterance.
    #[serde(default)]
    pub is_final: bool,

    /// Offset of the utterance start from the beginning of the stream,
    /// in seconds.
    #[serde(default)]
    pub start_offset: f64,

    /// Utterance duration in seconds.
    #[serde(default)]
    pub duration: f64,

    /// Which channel and role produced the utterance.
    pub participant: Participant,

    /// Wall-clock start of the utterance.
    #[serde(default)]
    pub start_timestamp: Option<DateTime<FixedOffset>>,

    /// Wall-clock end of the utterance.
    #[serde(default)]
    pub end_timestamp: Option<DateTime<FixedOffset>>,
}

/// Payload of a `fact` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactData {
    /// Fact identifier.
    pub id: String,

    /// The fact's text.
    pub text: String,

    /// Wall-clock start of the span the fact was drawn from.
    #[serde(default)]
    pub start_timestamp: Option<DateTime<FixedOffset>>,

    /// Wall-clock end of the span the fact was drawn from.
    #[serde(default)]
    pub end_timestamp: Option<DateTime<FixedOffset>>,

    /// Utterances supporting the fact.
    #[serde(default)]
    pub evidence: Option<Vec<Evidence>>,

    /// Whether the service considers the fact safe to discard.
    #[serde(default)]
    pub is_discardable: bool,

    /// Provenance tag, e.g. which extractor produced the fact.
    #[serde(default)]
    pub source: Option<String>,

    /// Identifiers of the groups the fact belongs to.
    #[serde(default)]
    pub group_ids: Vec<String>,
}

/// A supporting utterance referenced by a fact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Identifier of the supporting utterance.
    pub utterance_id: String,

    /// Text of the supporting utterance, when included.
    #[serde(default)]
    pub text: Option<String>,
}
