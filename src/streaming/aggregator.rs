//! Transcript aggregation across channels.
//!
//! Accumulates [`TranscriptData`] events into readable per-channel text
//! for display while a session is live.
//!
//! # Aggregation Strategy
//!
//! - **Interim** results replace the previous interim text for the channel
//!   (the service re-sends the whole utterance as it grows)
//! - **Final** results are appended to the channel's committed text and
//!   clear the interim

use std::collections::BTreeMap;

use super::protocol::TranscriptData;

#[derive(Debug, Default, Clone)]
struct ChannelTranscript {
    committed: String,
    interim: Option<String>,
    utterances: u64,
}

/// Aggregates transcript events into per-channel text.
#[derive(Debug, Default, Clone)]
pub struct TranscriptAggregator {
    channels: BTreeMap<u16, ChannelTranscript>,
}

impl TranscriptAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one transcript event.
    pub fn process(&mut self, data: &TranscriptData) {
        let entry = self.channels.entry(data.participant.channel).or_default();
        if data.is_final {
            if !entry.committed.is_empty() {
                entry.committed.push(' ');
            }
            entry.committed.push_str(data.text.trim());
            entry.interim = None;
            entry.utterances += 1;
            log::debug!(
                "Channel {}: {} final utterances, {} chars",
                data.participant.channel,
                entry.utterances,
                entry.committed.len()
            );
        } else {
            entry.interim = Some(data.text.clone());
        }
    }

    /// Best available text for a channel: committed text plus any live
    /// interim tail.
    pub fn current_text(&self, channel: u16) -> String {
        let Some(entry) = self.channels.get(&channel) else {
            return String::new();
        };
        match &entry.interim {
            Some(interim) if entry.committed.is_empty() => interim.clone(),
            Some(interim) => format!("{} {}", entry.committed, interim),
            None => entry.committed.clone(),
        }
    }

    /// Channels that have produced any text, in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = u16> + '_ {
        self.channels.keys().copied()
    }

    /// Whether any channel has text, interim or final.
    pub fn has_text(&self) -> bool {
        self.channels
            .values()
            .any(|c| !c.committed.is_empty() || c.interim.is_some())
    }
}
