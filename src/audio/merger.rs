//! Channel-mapping merger for multiple audio sources.
//!
//! [`merge`] combines N independent sources into a single N-channel stream:
//! the primary track of source `i` feeds output channel `i`, in array order.
//! The merge graph lives until the returned [`MergeTeardown`] is invoked;
//! it is never released implicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::source::{track_channel, AudioSource, AudioTrack, SampleBlock, TrackProducer};

/// Precondition violations reported by [`merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The source list was empty.
    NoSources,
    /// The source at the given 0-based index has no audio track.
    MissingAudioTrack { index: usize },
    /// The source at the given 0-based index does not share the sample rate
    /// of the first source.
    SampleRateMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NoSources => write!(f, "no sources to merge"),
            ValidationError::MissingAudioTrack { index } => {
                write!(f, "source {} has no audio track", index)
            }
            ValidationError::SampleRateMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "source {} has sample rate {} Hz, expected {} Hz",
                index, found, expected
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A derived source whose single track carries N-channel interleaved frames.
pub struct MergedStream {
    source: AudioSource,
    channels: u16,
}

impl MergedStream {
    /// Number of output channels (== number of merged sources).
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate of the merged output.
    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Consume the merged stream as a plain [`AudioSource`].
    pub fn into_source(self) -> AudioSource {
        self.source
    }
}

/// Handle that releases the merge graph.
///
/// Safe to call more than once; calls after the first are no-ops.
pub struct MergeTeardown {
    input_lives: Vec<Arc<AtomicBool>>,
    merged_live: Arc<AtomicBool>,
    token: CancellationToken,
    torn_down: bool,
}

impl MergeTeardown {
    /// Stop every track on the merged stream, then release the graph.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.merged_live.store(false, Ordering::SeqCst);
        for live in &self.input_lives {
            live.store(false, Ordering::SeqCst);
        }
        self.token.cancel();
        log::debug!("merge graph torn down");
    }
}

/// Merge the given sources into one channel-mapped stream.
///
/// Preconditions: `sources` is non-empty, every source has at least one
/// audio track, and all sources share one sample rate. Violations fail with
/// a [`ValidationError`] naming the cause.
///
/// The merge graph is a spawned task (callers must be inside a Tokio
/// runtime); it runs until a source ends, the merged track's consumer goes
/// away, or [`MergeTeardown::teardown`] is called.
pub fn merge(sources: Vec<AudioSource>) -> Result<(MergedStream, MergeTeardown), ValidationError> {
    let expected_rate = match sources.first() {
        Some(first) => first.sample_rate(),
        None => return Err(ValidationError::NoSources),
    };

    let mut inputs = Vec::with_capacity(sources.len());
    for (index, source) in sources.into_iter().enumerate() {
        if source.sample_rate() != expected_rate {
            return Err(ValidationError::SampleRateMismatch {
                index,
                expected: expected_rate,
                found: source.sample_rate(),
            });
        }
        match source.into_first_track() {
            Some(track) => inputs.push(track),
            None => return Err(ValidationError::MissingAudioTrack { index }),
        }
    }

    let channels = inputs.len() as u16;
    let input_lives = inputs.iter().map(AudioTrack::live_flag).collect();
    let (producer, merged_track) = track_channel(channels);
    let merged_live = merged_track.live_flag();
    let token = CancellationToken::new();

    tokio::spawn(run_merge_graph(inputs, producer, token.clone()));

    log::debug!("merge graph started with {} input channels", channels);

    Ok((
        MergedStream {
            source: AudioSource::from_track(expected_rate, merged_track),
            channels,
        },
        MergeTeardown {
            input_lives,
            merged_live,
            token,
            torn_down: false,
        },
    ))
}

/// The merge graph: pulls one run of samples per lagging input, interleaves
/// the aligned frames, and emits them on the merged track.
async fn run_merge_graph(
    mut inputs: Vec<AudioTrack>,
    out: TrackProducer,
    token: CancellationToken,
) {
    let n = inputs.len();
    let mut pending: Vec<Vec<i16>> = vec![Vec::new(); n];

    'merge: loop {
        for (i, track) in inputs.iter_mut().enumerate() {
            if !pending[i].is_empty() {
                continue;
            }
            let block = tokio::select! {
                _ = token.cancelled() => break 'merge,
                block = track.recv() => block,
            };
            match block {
                Some(block) => pending[i].extend(primary_channel(block, track.channels())),
                // A source ended; the merged stream ends with it.
                None => break 'merge,
            }
        }

        let frames = pending.iter().map(Vec::len).min().unwrap_or(0);
        if frames == 0 {
            continue;
        }

        let mut interleaved = vec![0i16; frames * n];
        for (ch, buf) in pending.iter_mut().enumerate() {
            for (frame, sample) in buf.drain(..frames).enumerate() {
                interleaved[frame * n + ch] = sample;
            }
        }

        if !out.push(interleaved) {
            break;
        }
    }

    log::debug!("merge graph released");
}

/// Extract channel 0 from an interleaved block.
fn primary_channel(block: SampleBlock, channels: u16) -> SampleBlock {
    if channels <= 1 {
        block
    } else {
        block
            .iter()
            .step_by(channels as usize)
            .copied()
            .collect()
    }
}
