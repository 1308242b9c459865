//! Streaming sample-rate conversion for the render loop
//!
//! Wraps a rubato fixed-output resampler so the engine can pull any number of
//! output frames from an arbitrary position in a [`SampleBuffer`] without
//! allocating on the audio thread.
//!
//! rubato works on fixed chunks of planar audio. The adapter keeps:
//! - a planar input scratch, filled by de-interleaving from the source buffer
//! - a planar output scratch holding the last converted chunk
//! - a read cursor into that chunk, so callers can take fewer frames than a
//!   chunk and pick up the rest on the next call
//!
//! All scratch memory is sized at construction. The filter state and any
//! buffered output are discarded by [`SampleRateConverter::reset`], which the
//! engine calls on every discontinuous reposition (play, loop, wrap-around).
//!
//! [`SampleBuffer`]: crate::types::SampleBuffer

use rubato::{
    FastFixedOut, PolynomialDegree, Resampler, SincFixedOut, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Sample;

/// Output frames produced per converter chunk
pub const CONVERTER_CHUNK_FRAMES: usize = 256;

/// Errors from the sample-rate converter
#[derive(Error, Debug)]
pub enum ResampleError {
    /// Channel count the converter cannot be built for
    #[error("Invalid channel count for resampler: {0}")]
    InvalidChannels(usize),

    /// Zero source or target rate
    #[error("Invalid resampling rates: {source_rate}Hz -> {target_rate}Hz")]
    InvalidRate { source_rate: u32, target_rate: u32 },

    /// rubato rejected the parameters
    #[error("Failed to create resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    /// Processing a chunk failed (only raised on the audio thread, carries no data)
    #[error("Resampler failed to process a chunk")]
    ProcessFailed,
}

/// Result type for converter operations
pub type ResampleResult<T> = Result<T, ResampleError>;

/// Interpolation quality of the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleQuality {
    /// Cubic polynomial interpolation, cheapest
    Fast,
    /// Short windowed sinc, comparable to libsamplerate's fastest sinc
    #[default]
    Balanced,
    /// Long windowed sinc, highest quality and most CPU
    Best,
}

impl ResampleQuality {
    /// Human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fast => "Polynomial (Fast)",
            Self::Balanced => "Sinc 64 (Balanced)",
            Self::Best => "Sinc 256 (Best)",
        }
    }

    fn sinc_parameters(&self) -> Option<SincInterpolationParameters> {
        match self {
            Self::Fast => None,
            Self::Balanced => Some(SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.915,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::BlackmanHarris2,
            }),
            Self::Best => Some(SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            }),
        }
    }
}

/// Frames moved by one [`SampleRateConverter::process`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterOutput {
    /// Source frames consumed from the buffer
    pub input_frames_used: usize,
    /// Frames written to the outputs
    pub output_frames: usize,
}

/// Concrete rubato resampler (the rubato trait is not object safe)
enum Converter {
    Sinc(SincFixedOut<Sample>),
    Polynomial(FastFixedOut<Sample>),
}

impl Converter {
    fn input_frames_next(&self) -> usize {
        match self {
            Converter::Sinc(r) => r.input_frames_next(),
            Converter::Polynomial(r) => r.input_frames_next(),
        }
    }

    fn input_frames_max(&self) -> usize {
        match self {
            Converter::Sinc(r) => r.input_frames_max(),
            Converter::Polynomial(r) => r.input_frames_max(),
        }
    }

    fn output_frames_max(&self) -> usize {
        match self {
            Converter::Sinc(r) => r.output_frames_max(),
            Converter::Polynomial(r) => r.output_frames_max(),
        }
    }

    fn process(
        &mut self,
        input: &[Vec<Sample>],
        output: &mut [Vec<Sample>],
    ) -> Result<(usize, usize), rubato::ResampleError> {
        match self {
            Converter::Sinc(r) => r.process_into_buffer(input, output, None),
            Converter::Polynomial(r) => r.process_into_buffer(input, output, None),
        }
    }

    fn reset(&mut self) {
        match self {
            Converter::Sinc(r) => r.reset(),
            Converter::Polynomial(r) => r.reset(),
        }
    }

    /// Output frames computed from the zeroed history after a reset
    ///
    /// The sinc converter starts centred on the first input frame. The
    /// polynomial one lags by half its interpolation window.
    fn startup_frames(&self) -> usize {
        match self {
            Converter::Sinc(_) => 0,
            Converter::Polynomial(r) => r.output_delay(),
        }
    }
}

/// Streaming converter bound to one sample buffer's channel layout
///
/// Built on the control thread when a sample is loaded, then moved to the
/// audio thread together with its buffer.
pub struct SampleRateConverter {
    inner: Converter,
    channels: usize,
    source_rate: u32,
    target_rate: u32,
    /// Planar input scratch (one plane per source channel)
    input: Vec<Vec<Sample>>,
    /// Planar output of the last processed chunk
    output: Vec<Vec<Sample>>,
    /// Read position in `output`
    cursor: usize,
    /// Frames in `output` not yet handed out
    pending: usize,
    /// Start-up frames still to discard after a reset
    warmup: usize,
}

impl SampleRateConverter {
    /// Build a converter from `source_rate` to `target_rate` for `channels` channels
    pub fn new(
        source_rate: u32,
        target_rate: u32,
        channels: usize,
        quality: ResampleQuality,
    ) -> ResampleResult<Self> {
        if channels == 0 {
            return Err(ResampleError::InvalidChannels(channels));
        }
        if source_rate == 0 || target_rate == 0 {
            return Err(ResampleError::InvalidRate {
                source_rate,
                target_rate,
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let inner = match quality.sinc_parameters() {
            Some(params) => Converter::Sinc(SincFixedOut::<Sample>::new(
                ratio,
                1.0,
                params,
                CONVERTER_CHUNK_FRAMES,
                channels,
            )?),
            None => Converter::Polynomial(FastFixedOut::<Sample>::new(
                ratio,
                1.0,
                PolynomialDegree::Cubic,
                CONVERTER_CHUNK_FRAMES,
                channels,
            )?),
        };

        let input = vec![vec![0.0; inner.input_frames_max()]; channels];
        let warmup = inner.startup_frames();
        let output = vec![vec![0.0; inner.output_frames_max()]; channels];

        log::debug!(
            "Resampler created: {}Hz -> {}Hz, {} channels, {}",
            source_rate,
            target_rate,
            channels,
            quality.display_name()
        );

        Ok(Self {
            inner,
            channels,
            source_rate,
            target_rate,
            input,
            output,
            cursor: 0,
            pending: 0,
            warmup,
        })
    }

    /// Output rate divided by input rate
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.target_rate as f64 / self.source_rate as f64
    }

    /// Number of source channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Source sample rate in Hz
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Target (device) sample rate in Hz
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Largest number of output frames a single call can deliver
    #[inline]
    pub fn max_output_frames(&self) -> usize {
        CONVERTER_CHUNK_FRAMES
    }

    /// Discard filter state and buffered output
    ///
    /// Must be called whenever the read position jumps, otherwise the tail
    /// of the previous position bleeds into the new one.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.cursor = 0;
        self.pending = 0;
        self.warmup = self.inner.startup_frames();
    }

    /// Convert audio starting at `input_index` into `left`/`right`
    ///
    /// `input_index` is an interleaved sample index into `source` (a multiple
    /// of the channel count). Up to `left.len()` frames are produced; mono
    /// sources are duplicated to both outputs and only the first two
    /// channels of wider sources are rendered. Once the source runs out the
    /// converter is fed silence so its filter tail can drain.
    ///
    /// Real-time safe: no allocation, no locking.
    pub fn process(
        &mut self,
        source: &[Sample],
        input_index: usize,
        left: &mut [Sample],
        right: &mut [Sample],
    ) -> ResampleResult<ConverterOutput> {
        let wanted = left.len().min(right.len());
        let mut result = ConverterOutput::default();
        let mut read_index = input_index;

        while result.output_frames < wanted {
            if self.pending == 0 {
                let used = self.refill(source, read_index)?;
                read_index += used * self.channels;
                result.input_frames_used += used;
                if self.pending == 0 {
                    break;
                }
            }
            if self.warmup > 0 {
                let skip = self.warmup.min(self.pending);
                self.cursor += skip;
                self.pending -= skip;
                self.warmup -= skip;
                continue;
            }

            let count = self.pending.min(wanted - result.output_frames);
            let (left_plane, right_plane) = if self.channels >= 2 {
                (0, 1)
            } else {
                (0, 0)
            };
            let range = self.cursor..self.cursor + count;
            let dest = result.output_frames..result.output_frames + count;
            left[dest.clone()].copy_from_slice(&self.output[left_plane][range.clone()]);
            right[dest].copy_from_slice(&self.output[right_plane][range]);

            self.cursor += count;
            self.pending -= count;
            result.output_frames += count;
        }

        Ok(result)
    }

    /// Convert one chunk, returning the number of source frames consumed
    fn refill(&mut self, source: &[Sample], input_index: usize) -> ResampleResult<usize> {
        let needed = self.inner.input_frames_next();
        let available = source.len().saturating_sub(input_index) / self.channels;
        let take = needed.min(available);

        for (ch, plane) in self.input.iter_mut().enumerate() {
            for (frame, slot) in plane[..take].iter_mut().enumerate() {
                *slot = source[input_index + frame * self.channels + ch];
            }
            plane[take..needed].fill(0.0);
        }

        let (_, produced) = self
            .inner
            .process(&self.input, &mut self.output)
            .map_err(|_| ResampleError::ProcessFailed)?;

        self.cursor = 0;
        self.pending = produced;
        Ok(take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, channels: usize, rate: u32) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin();
                std::iter::repeat(v).take(channels)
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(matches!(
            SampleRateConverter::new(44100, 48000, 0, ResampleQuality::Fast),
            Err(ResampleError::InvalidChannels(0))
        ));
        assert!(matches!(
            SampleRateConverter::new(0, 48000, 2, ResampleQuality::Fast),
            Err(ResampleError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_ratio() {
        let conv = SampleRateConverter::new(24000, 48000, 1, ResampleQuality::Fast).unwrap();
        assert!((conv.ratio() - 2.0).abs() < 1e-12);
        assert_eq!(conv.channels(), 1);
    }

    #[test]
    fn test_fills_requested_frames() {
        let source = sine(4096, 2, 44100);
        for quality in [ResampleQuality::Fast, ResampleQuality::Balanced, ResampleQuality::Best] {
            let mut conv = SampleRateConverter::new(44100, 48000, 2, quality).unwrap();
            let mut left = vec![0.0; 100];
            let mut right = vec![0.0; 100];

            let out = conv.process(&source, 0, &mut left, &mut right).unwrap();
            assert_eq!(out.output_frames, 100);
            // One full chunk was consumed to produce the first 100 frames
            assert!(out.input_frames_used > 0);

            // Remaining frames of the chunk are served without consuming input
            let out = conv.process(&source, out.input_frames_used * 2, &mut left, &mut right).unwrap();
            assert_eq!(out.output_frames, 100);
            assert_eq!(out.input_frames_used, 0);
        }
    }

    #[test]
    fn test_input_consumption_tracks_ratio() {
        // Upsampling 2x consumes roughly half as many input frames as it produces
        let source = sine(20_000, 1, 24000);
        let mut conv = SampleRateConverter::new(24000, 48000, 1, ResampleQuality::Fast).unwrap();
        let mut left = vec![0.0; CONVERTER_CHUNK_FRAMES];
        let mut right = vec![0.0; CONVERTER_CHUNK_FRAMES];

        let mut index = 0;
        let mut produced = 0;
        for _ in 0..20 {
            let out = conv.process(&source, index, &mut left, &mut right).unwrap();
            index += out.input_frames_used;
            produced += out.output_frames;
        }
        let ratio = produced as f64 / index as f64;
        assert!((ratio - 2.0).abs() < 0.1, "ratio was {}", ratio);
    }

    #[test]
    fn test_mono_is_duplicated() {
        let source = sine(2048, 1, 22050);
        let mut conv = SampleRateConverter::new(22050, 44100, 1, ResampleQuality::Balanced).unwrap();
        let mut left = vec![0.0; 128];
        let mut right = vec![0.0; 128];
        conv.process(&source, 0, &mut left, &mut right).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_exhausted_source_still_produces_tail() {
        let source = sine(10, 2, 44100);
        let mut conv = SampleRateConverter::new(44100, 48000, 2, ResampleQuality::Fast).unwrap();
        let mut left = vec![1.0; 64];
        let mut right = vec![1.0; 64];

        let out = conv.process(&source, source.len(), &mut left, &mut right).unwrap();
        assert_eq!(out.input_frames_used, 0);
        assert_eq!(out.output_frames, 64);
    }

    #[test]
    fn test_reset_discards_buffered_output() {
        let source = sine(4096, 2, 44100);
        let mut conv = SampleRateConverter::new(44100, 48000, 2, ResampleQuality::Fast).unwrap();
        let mut left = vec![0.0; 10];
        let mut right = vec![0.0; 10];

        conv.process(&source, 0, &mut left, &mut right).unwrap();
        conv.reset();

        // After reset the next call must pull fresh input again
        let out = conv.process(&source, 0, &mut left, &mut right).unwrap();
        assert!(out.input_frames_used > 0);
    }

    #[test]
    fn test_polynomial_start_has_no_lag() {
        let source = vec![0.5; 4096];
        let mut conv = SampleRateConverter::new(44100, 48000, 1, ResampleQuality::Fast).unwrap();
        let mut left = vec![0.0; 32];
        let mut right = vec![0.0; 32];

        for _ in 0..2 {
            conv.process(&source, 1000, &mut left, &mut right).unwrap();
            assert!(
                left.iter().all(|s| (s - 0.5).abs() < 0.05),
                "start of output ramps in: {:?}",
                &left[..8]
            );
            conv.reset();
        }
    }
}
