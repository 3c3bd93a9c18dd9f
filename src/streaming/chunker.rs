//! Fixed-duration audio chunk encoder.
//!
//! Bridges an [`AudioTrack`] to the transport: accumulates incoming sample
//! blocks and emits one PCM16 little-endian byte chunk per 200 ms of audio.
//! The encoder is attached only after the service accepts the session
//! configuration, and is stopped through its cancellation token.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioTrack;

/// Chunk cadence used by every session.
pub const CHUNK_DURATION_MS: u32 = 200;

/// Configuration for the chunk encoder.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Sample rate of the track in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count of the track.
    pub channels: u16,
    /// Duration of each emitted chunk in milliseconds.
    pub chunk_duration_ms: u32,
}

impl EncoderConfig {
    /// Standard configuration for a track: 200 ms chunks.
    pub fn for_track(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            chunk_duration_ms: CHUNK_DURATION_MS,
        }
    }

    /// Interleaved samples per emitted chunk.
    pub fn samples_per_chunk(&self) -> usize {
        (self.sample_rate * self.chunk_duration_ms / 1000) as usize * self.channels as usize
    }
}

/// Encode samples as PCM16 little-endian bytes.
pub fn encode_pcm16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|&s| s.to_le_bytes()).collect()
}

/// Spawn the encoder task for a track.
///
/// Emits byte chunks on `out` until the track ends (a final partial chunk
/// is flushed) or the token is cancelled (nothing is flushed).
pub fn spawn_encoder(
    mut track: AudioTrack,
    config: EncoderConfig,
    out: mpsc::Sender<Vec<u8>>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let samples_per_chunk = config.samples_per_chunk();
    log::info!(
        "Encoder started: {} Hz, {} channels, {} ms chunks = {} samples",
        config.sample_rate,
        config.channels,
        config.chunk_duration_ms,
        samples_per_chunk
    );

    tokio::spawn(async move {
        let mut buffer: Vec<i16> = Vec::with_capacity(samples_per_chunk * 2);
        let mut chunks_sent: u64 = 0;

        loop {
            let block = tokio::select! {
                _ = token.cancelled() => break,
                block = track.recv() => block,
            };

            let Some(block) = block else {
                // Track ended; flush whatever is buffered as a final
                // partial chunk.
                if !buffer.is_empty() {
                    log::debug!("Encoder flushing final partial chunk ({} samples)", buffer.len());
                    let _ = out.send(encode_pcm16le(&buffer)).await;
                }
                break;
            };

            buffer.extend(block);
            while buffer.len() >= samples_per_chunk {
                let chunk: Vec<i16> = buffer.drain(..samples_per_chunk).collect();
                if out.send(encode_pcm16le(&chunk)).await.is_err() {
                    return;
                }
                chunks_sent += 1;
                if chunks_sent % 50 == 0 {
                    log::debug!("Encoder emitted {} chunks", chunks_sent);
                }
            }
        }

        log::debug!("Encoder stopped after {} chunks", chunks_sent);
    })
}
