//! CPAL audio backend
//!
//! Opens one output stream on the configured (or default) device. The
//! stream callback owns the engine: it renders into pre-allocated left/right
//! scratch and interleaves into the device buffer, giving any channels past
//! the first two silence.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
use super::device::{default_device, find_device};
use super::error::{AudioError, AudioResult};
use crate::engine::PlaybackEngine;
use crate::types::Sample;

/// CPAL-specific audio handle
///
/// Keeps the stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

/// State owned by the stream callback
struct CallbackState {
    engine: PlaybackEngine,
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl CallbackState {
    fn new(engine: PlaybackEngine) -> Self {
        Self {
            engine,
            left: vec![0.0; MAX_BUFFER_SIZE],
            right: vec![0.0; MAX_BUFFER_SIZE],
        }
    }

    /// Render into an interleaved device buffer
    ///
    /// Callbacks longer than the scratch are rendered in several passes.
    fn render(&mut self, data: &mut [f32], channels: usize) {
        for block in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let frames = block.len() / channels;
            let (left, right) = (&mut self.left[..frames], &mut self.right[..frames]);
            self.engine.process(left, right);

            for ((frame, l), r) in block.chunks_exact_mut(channels).zip(left.iter()).zip(right.iter()) {
                frame[0] = *l;
                if channels > 1 {
                    frame[1] = *r;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

/// Start the CPAL audio system
pub fn start_audio_system(
    config: &AudioConfig,
    mut engine: PlaybackEngine,
) -> AudioResult<CpalAudioHandle> {
    let device = match &config.device {
        Some(id) => find_device(id)?,
        None => default_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    engine.set_output_sample_rate(sample_rate);
    let stream = build_output_stream(&device, &stream_config, CallbackState::new(engine))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(CpalAudioHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
    })
}

/// Pick the device configuration closest to the preferences
///
/// Returns the supported config and the buffer size in frames.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    // f32 stereo at the target rate, then any f32 stereo, then any f32
    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .find(|c| c.channels() >= 2 && in_range(c))
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| {
            AudioError::ConfigError("No 32-bit float output configuration".to_string())
        })?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(32, MAX_BUFFER_SIZE as u32),
    };

    Ok((best.clone().with_sample_rate(sample_rate), buffer_size))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: CallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.render(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, sample_channel, Command, LoadedSample};
    use crate::types::SampleBuffer;
    use std::sync::Arc;

    #[test]
    fn test_render_interleaves_and_silences_extra_channels() {
        let (mut commands, command_rx) = command_channel(4);
        let (mut samples, sample_rx) = sample_channel(1);
        let (retired_tx, _retired_rx) = sample_channel(1);
        let engine = PlaybackEngine::new(command_rx, sample_rx, retired_tx);

        let buffer = SampleBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 2, 48000).unwrap();
        samples
            .push(LoadedSample::new(Arc::new(buffer), None))
            .unwrap();
        commands.push(Command::Play { start: 0, end: 0 }).unwrap();

        let mut state = CallbackState::new(engine);
        let mut data = vec![9.0; 3 * 3];
        state.render(&mut data, 3);
        assert_eq!(data, vec![0.1, 0.2, 0.0, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_render_splits_long_callbacks() {
        let (_commands, command_rx) = command_channel(1);
        let (_samples, sample_rx) = sample_channel(1);
        let (retired_tx, _retired_rx) = sample_channel(1);
        let engine = PlaybackEngine::new(command_rx, sample_rx, retired_tx);
        let atomics = engine.atomics();

        let mut state = CallbackState::new(engine);
        let mut data = vec![1.0; (MAX_BUFFER_SIZE + 100) * 2];
        state.render(&mut data, 2);
        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(atomics.frames_rendered(), (MAX_BUFFER_SIZE + 100) as u64);
    }
}
