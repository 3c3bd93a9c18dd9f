//! Microphone capture adapter using CPAL.
//!
//! Builds an [`AudioSource`] from the default input device. Capability
//! problems (no device, no usable configuration) fail fast before any
//! session is started; the stream itself lives as long as the returned
//! [`CaptureHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

use super::source::{track_channel, AudioSource, TrackProducer};

/// Errors that can occur while setting up device capture.
#[derive(Debug, Clone)]
pub enum CaptureError {
    NoInputDevice,
    NoSupportedConfig,
    StreamCreationFailed(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::NoInputDevice => write!(f, "No audio input device found"),
            CaptureError::NoSupportedConfig => write!(f, "No supported audio configuration"),
            CaptureError::StreamCreationFailed(e) => {
                write!(f, "Failed to create audio stream: {}", e)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Handle to an active capture.
///
/// The capture stops when `stop()` is called or the handle is dropped.
pub struct CaptureHandle {
    _stream: Stream,
    live: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Stop delivering samples and release the device stream.
    pub fn stop(self) {
        self.live.store(false, Ordering::SeqCst);
        log::info!("Capture stopped");
    }
}

/// Capture from the default input device.
pub struct DeviceCapture {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl DeviceCapture {
    /// Open the default input device with its default configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        log::info!("Using audio input device: {:?}", device.name());

        let supported_config = device
            .default_input_config()
            .map_err(|_| CaptureError::NoSupportedConfig)?;

        log::info!(
            "Audio config: {} Hz, {} channels, {:?}",
            supported_config.sample_rate().0,
            supported_config.channels(),
            supported_config.sample_format()
        );

        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    /// Sample rate the device will deliver.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Channel count the device will deliver.
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start capturing into a new [`AudioSource`].
    pub fn start(&self) -> Result<(CaptureHandle, AudioSource), CaptureError> {
        let (producer, track) = track_channel(self.config.channels);
        let live = track.live_flag();

        let stream = self.build_stream(producer)?;
        stream.play().map_err(|e| {
            CaptureError::StreamCreationFailed(format!("Failed to start stream: {}", e))
        })?;

        log::info!("Capture started");

        Ok((
            CaptureHandle {
                _stream: stream,
                live,
            },
            AudioSource::from_track(self.config.sample_rate.0, track),
        ))
    }

    fn build_stream(&self, producer: TrackProducer) -> Result<Stream, CaptureError> {
        let err_fn = |err| log::error!("Audio stream error: {}", err);

        match self.sample_format {
            SampleFormat::I16 => self.build_stream_typed::<i16>(producer, err_fn),
            SampleFormat::U16 => self.build_stream_typed::<u16>(producer, err_fn),
            SampleFormat::F32 => self.build_stream_typed::<f32>(producer, err_fn),
            _ => Err(CaptureError::NoSupportedConfig),
        }
    }

    fn build_stream_typed<T>(
        &self,
        producer: TrackProducer,
        err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
    ) -> Result<Stream, CaptureError>
    where
        T: cpal::Sample<Float = f32> + cpal::SizedSample + Send + 'static,
    {
        let config = self.config.clone();

        let stream = self
            .device
            .build_input_stream(
                &config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if !producer.is_live() {
                        return;
                    }
                    let block: Vec<i16> = data.iter().map(|&s| sample_to_i16(s)).collect();
                    producer.push(block);
                },
                err_fn,
                None,
            )
            .map_err(|e| CaptureError::StreamCreationFailed(e.to_string()))?;

        Ok(stream)
    }
}

/// Convert any device sample type to i16.
fn sample_to_i16<T: cpal::Sample<Float = f32>>(sample: T) -> i16 {
    let f32_sample: f32 = sample.to_float_sample();
    let clamped = f32_sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_to_i16() {
        assert_eq!(sample_to_i16(0.0f32), 0);
        assert_eq!(sample_to_i16(1.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-1.0f32), -i16::MAX);

        // Out-of-range input is clamped.
        assert_eq!(sample_to_i16(2.0f32), i16::MAX);
        assert_eq!(sample_to_i16(-2.0f32), -i16::MAX);
    }

    #[test]
    fn test_capture_error_display() {
        assert!(CaptureError::NoInputDevice.to_string().contains("input device"));
        let err = CaptureError::StreamCreationFailed("busy".to_string());
        assert!(err.to_string().contains("busy"));
    }
}
