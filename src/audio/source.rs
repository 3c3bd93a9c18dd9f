//! Audio sources and the tracks they deliver samples on.
//!
//! An [`AudioSource`] is a transient, runtime-only handle to a live audio
//! feed. It owns zero or more [`AudioTrack`]s; each track delivers blocks of
//! interleaved PCM16 samples over a bounded channel. Producers (the capture
//! adapter, the merge graph, synthetic generators) hold the matching
//! [`TrackProducer`] and check its liveness flag before pushing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// A block of interleaved PCM16 samples.
pub type SampleBlock = Vec<i16>;

/// Default capacity of a track's delivery channel, in blocks.
const TRACK_CHANNEL_CAPACITY: usize = 32;

/// Producer half of an audio track.
///
/// Pushing never blocks: the capture callback and the merge graph are
/// fire-and-forget, so a full channel drops the block rather than stalling
/// the producer.
pub struct TrackProducer {
    tx: mpsc::Sender<SampleBlock>,
    live: Arc<AtomicBool>,
}

impl TrackProducer {
    /// Push a block of samples to the track.
    ///
    /// Returns `false` once the track has been stopped or its consumer has
    /// gone away; producers should cease on `false`.
    pub fn push(&self, block: SampleBlock) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            return false;
        }
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("audio track channel full, dropping block");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the track is still accepting samples.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Consumer half of an audio track.
pub struct AudioTrack {
    rx: mpsc::Receiver<SampleBlock>,
    live: Arc<AtomicBool>,
    channels: u16,
}

impl AudioTrack {
    /// Number of interleaved channels in each delivered block.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Receive the next block of samples.
    ///
    /// Returns `None` when the producer side has ended the track.
    pub async fn recv(&mut self) -> Option<SampleBlock> {
        self.rx.recv().await
    }

    /// Signal the producer to stop delivering samples.
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// Clone of the liveness flag, for teardown handles that outlive the
    /// track itself.
    pub(crate) fn live_flag(&self) -> Arc<AtomicBool> {
        self.live.clone()
    }
}

/// Create a connected producer/track pair.
pub fn track_channel(channels: u16) -> (TrackProducer, AudioTrack) {
    track_channel_with_capacity(channels, TRACK_CHANNEL_CAPACITY)
}

/// Create a connected producer/track pair with an explicit channel capacity.
pub fn track_channel_with_capacity(
    channels: u16,
    capacity: usize,
) -> (TrackProducer, AudioTrack) {
    let (tx, rx) = mpsc::channel(capacity);
    let live = Arc::new(AtomicBool::new(true));
    (
        TrackProducer {
            tx,
            live: live.clone(),
        },
        AudioTrack { rx, live, channels },
    )
}

/// A live audio feed with zero or more tracks.
///
/// Sources carry no persistent identity; they exist for the duration of a
/// capture or merge and are consumed by the component that streams them.
pub struct AudioSource {
    sample_rate: u32,
    tracks: Vec<AudioTrack>,
}

impl AudioSource {
    /// Create a source with no tracks yet.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            tracks: Vec::new(),
        }
    }

    /// Create a source from an existing track.
    pub fn from_track(sample_rate: u32, track: AudioTrack) -> Self {
        Self {
            sample_rate,
            tracks: vec![track],
        }
    }

    /// Add a track to the source.
    pub fn add_track(&mut self, track: AudioTrack) {
        self.tracks.push(track);
    }

    /// Sample rate shared by all tracks of this source.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the source has at least one audio track.
    pub fn has_audio_track(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Consume the source, returning its tracks in order.
    pub fn into_tracks(self) -> Vec<AudioTrack> {
        self.tracks
    }

    /// Consume the source, returning its first track.
    ///
    /// Additional tracks are dropped; streaming and merging both operate on
    /// a source's primary track.
    pub fn into_first_track(self) -> Option<AudioTrack> {
        let mut tracks = self.tracks;
        if tracks.len() > 1 {
            log::debug!("source has {} tracks, using the first", tracks.len());
        }
        if tracks.is_empty() {
            None
        } else {
            Some(tracks.remove(0))
        }
    }
}

/// Deterministic sample generator for tests and demos.
///
/// Stands in for device capture where no hardware is available, feeding a
/// real [`AudioSource`] with pre-generated blocks.
pub struct SyntheticSource {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl SyntheticSource {
    /// Create a generator at the given sample rate (mono).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    /// Sample rate of the generated audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let n = self.samples_for_duration(duration_ms);
        self.samples.extend(std::iter::repeat(0i16).take(n));
    }

    /// Append a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let n = self.samples_for_duration(duration_ms);
        let sample_rate = f64::from(self.sample_rate);
        for i in 0..n {
            let t = i as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            self.samples.push((value * 32767.0) as i16);
        }
    }

    /// Append a constant sample value for the given duration.
    pub fn generate_constant(&mut self, value: i16, duration_ms: u64) {
        let n = self.samples_for_duration(duration_ms);
        self.samples.extend(std::iter::repeat(value).take(n));
    }

    /// Take all accumulated samples, clearing the internal buffer.
    pub fn take_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }

    /// Consume the generator into a one-track [`AudioSource`].
    ///
    /// The accumulated samples are split into blocks of `block_ms` and
    /// preloaded onto the track; the track ends after the last block.
    pub fn into_source(mut self, block_ms: u64) -> AudioSource {
        let block_len = self.samples_for_duration(block_ms).max(1);
        let samples = self.take_samples();
        let blocks: Vec<SampleBlock> = samples.chunks(block_len).map(<[i16]>::to_vec).collect();

        let (producer, track) = track_channel_with_capacity(1, blocks.len().max(1));
        for block in blocks {
            producer.push(block);
        }
        // Dropping the producer ends the track once the blocks are drained.
        AudioSource::from_track(self.sample_rate, track)
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_channel_delivers_in_order() {
        let (producer, mut track) = track_channel(1);
        assert!(producer.push(vec![1, 2]));
        assert!(producer.push(vec![3, 4]));
        drop(producer);

        assert_eq!(track.recv().await, Some(vec![1, 2]));
        assert_eq!(track.recv().await, Some(vec![3, 4]));
        assert_eq!(track.recv().await, None);
    }

    #[test]
    fn test_track_stop_rejects_pushes() {
        let (producer, track) = track_channel(1);
        track.stop();
        assert!(!producer.push(vec![0]));
        assert!(!producer.is_live());
    }

    #[test]
    fn test_push_drops_when_full() {
        let (producer, _track) = track_channel_with_capacity(1, 1);
        assert!(producer.push(vec![1]));
        // Channel is full; the block is dropped but the producer stays live.
        assert!(producer.push(vec![2]));
        assert!(producer.is_live());
    }

    #[test]
    fn test_synthetic_silence_length() {
        let mut synth = SyntheticSource::new(16000);
        synth.generate_silence(100);
        let samples = synth.take_samples();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_synthetic_constant() {
        let mut synth = SyntheticSource::new(8000);
        synth.generate_constant(42, 250);
        let samples = synth.take_samples();
        assert_eq!(samples.len(), 2000);
        assert!(samples.iter().all(|&s| s == 42));
    }

    #[tokio::test]
    async fn test_synthetic_into_source_blocks() {
        let mut synth = SyntheticSource::new(1000);
        synth.generate_constant(7, 400);
        let source = synth.into_source(200);
        assert!(source.has_audio_track());

        let mut track = source.into_first_track().unwrap();
        assert_eq!(track.recv().await, Some(vec![7; 200]));
        assert_eq!(track.recv().await, Some(vec![7; 200]));
        assert_eq!(track.recv().await, None);
    }
}
