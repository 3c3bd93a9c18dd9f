//! Audio sources, device capture, and channel merging.
//!
//! This module supplies the audio side of the client: [`AudioSource`]s
//! delivering PCM16 sample blocks, a CPAL capture adapter for the default
//! input device, a synthetic generator for hardware-free tests, and the
//! [`merge`] utility that maps N sources onto the N channels of one stream.

pub mod capture;
pub mod merger;
pub mod source;

pub use capture::{CaptureError, CaptureHandle, DeviceCapture};
pub use merger::{merge, MergeTeardown, MergedStream, ValidationError};
pub use source::{
    track_channel, AudioSource, AudioTrack, SampleBlock, SyntheticSource, TrackProducer,
};
