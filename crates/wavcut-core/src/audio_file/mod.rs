//! Audio file decoding
//!
//! Decodes WAV, MP3 and FLAC files with symphonia into an interleaved
//! [`SampleBuffer`] at the file's own sample rate and channel count. Rate
//! conversion happens later, when the sample is loaded into the player.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{SampleBuffer, SampleBufferError};

/// Errors raised while decoding a file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not a format symphonia recognises, or no audio track in it
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("File declares no sample rate")]
    UnknownSampleRate,

    /// Decoding produced no samples
    #[error("File contains no audio")]
    Empty,

    #[error("Decoded audio is malformed: {0}")]
    Malformed(#[from] SampleBufferError),
}

/// Decode a whole file into memory
pub fn decode(path: impl AsRef<Path>) -> Result<SampleBuffer, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut scratch: Option<DecodeBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Stopped reading {:?} early: {}", path, e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => {
                log::warn!("Stopped decoding {:?} early: {}", path, e);
                break;
            }
        };

        let spec = *decoded.spec();
        sample_rate = sample_rate.or(Some(spec.rate));
        channels = channels.or(Some(spec.channels.count()));

        let needs_alloc = scratch
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity() * spec.channels.count());
        if needs_alloc {
            scratch = Some(DecodeBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = scratch.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sample_rate = sample_rate.ok_or(DecodeError::UnknownSampleRate)?;
    let channels = channels.unwrap_or(2);
    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    let buffer = SampleBuffer::new(samples, channels, sample_rate)?;
    log::info!(
        "Decoded {:?}: {} channel(s), {}Hz, {} frames ({:.2}s)",
        path,
        buffer.channels(),
        buffer.sample_rate(),
        buffer.frame_count(),
        buffer.duration_seconds()
    );
    Ok(buffer)
}

/// Min/max envelope of a buffer, one `(min, max)` pair per column
///
/// Channels are averaged. Returns an empty vector when the buffer has fewer
/// frames than columns.
pub fn overview_peaks(buffer: &SampleBuffer, width: usize) -> Vec<(f32, f32)> {
    let frames = buffer.frame_count();
    if width == 0 || frames < width {
        return Vec::new();
    }
    let channels = buffer.channels();
    let frames_per_column = frames / width;

    (0..width)
        .map(|col| {
            let start = col * frames_per_column;
            let end = if col + 1 == width {
                frames
            } else {
                start + frames_per_column
            };
            buffer
                .frames(start, end)
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                    (lo.min(s), hi.max(s))
                })
        })
        .collect()
}
