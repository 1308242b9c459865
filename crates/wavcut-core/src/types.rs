//! Common types for wavcut
//!
//! This module contains the fundamental audio types shared by the engine,
//! the decoder and the control side: the immutable decoded sample buffer and
//! the playback state.

use thiserror::Error;

/// Audio sample type (32-bit float, interleaved)
pub type Sample = f32;

/// Errors raised when constructing a [`SampleBuffer`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleBufferError {
    #[error("Sample buffer must have at least one channel")]
    NoChannels,

    #[error("Sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("Sample count {len} is not a multiple of the channel count {channels}")]
    RaggedFrames { len: usize, channels: usize },
}

/// Immutable decoded audio
///
/// Interleaved samples ([L, R, L, R, ...] for stereo) plus the channel count
/// and source sample rate. Once built, a buffer is never mutated: the engine
/// reads it on the audio thread while the control side may read it for export.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
    channels: usize,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from interleaved samples
    pub fn new(
        samples: Vec<Sample>,
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, SampleBufferError> {
        if channels == 0 {
            return Err(SampleBufferError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(SampleBufferError::InvalidSampleRate);
        }
        if samples.len() % channels != 0 {
            return Err(SampleBufferError::RaggedFrames {
                len: samples.len(),
                channels,
            });
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Interleaved sample data
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of interleaved channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Source sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total number of samples across all channels
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no audio
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames (one sample instant across all channels)
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Duration in seconds at the source sample rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples of the frame range `[start, end)`, clamped to the buffer
    pub fn frames(&self, start: usize, end: usize) -> &[Sample] {
        let end = end.min(self.frame_count());
        let start = start.min(end);
        &self.samples[start * self.channels..end * self.channels]
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.samples.len() * std::mem::size_of::<Sample>()
    }
}

/// Playback state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Looping = 2,
}

impl PlaybackState {
    /// Decode from the raw value stored in the engine atomics
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Looping,
            _ => PlaybackState::Stopped,
        }
    }

    /// Whether audio is being produced
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_frame_count() {
        let buffer = SampleBuffer::new(vec![0.0; 12], 2, 44100).unwrap();
        assert_eq!(buffer.frame_count(), 6);
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.memory_usage(), 48);
    }

    #[test]
    fn test_buffer_rejects_invalid_layout() {
        assert_eq!(
            SampleBuffer::new(vec![0.0; 4], 0, 44100),
            Err(SampleBufferError::NoChannels)
        );
        assert_eq!(
            SampleBuffer::new(vec![0.0; 4], 2, 0),
            Err(SampleBufferError::InvalidSampleRate)
        );
        assert_eq!(
            SampleBuffer::new(vec![0.0; 5], 2, 44100),
            Err(SampleBufferError::RaggedFrames { len: 5, channels: 2 })
        );
    }

    #[test]
    fn test_frames_slice_is_clamped() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let buffer = SampleBuffer::new(samples, 2, 48000).unwrap();
        assert_eq!(buffer.frames(1, 3), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.frames(4, 100), &[8.0, 9.0]);
        assert!(buffer.frames(7, 9).is_empty());
    }

    #[test]
    fn test_playback_state_roundtrip() {
        for state in [PlaybackState::Stopped, PlaybackState::Playing, PlaybackState::Looping] {
            assert_eq!(PlaybackState::from_u8(state as u8), state);
        }
        assert!(!PlaybackState::Stopped.is_active());
        assert!(PlaybackState::Looping.is_active());
    }
}
