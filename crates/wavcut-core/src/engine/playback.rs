//! Playback engine - state machine and render loop
//!
//! The engine lives on the audio thread. Each callback it:
//! 1. Adopts a newly loaded sample, retiring the previous one
//! 2. Applies all pending commands in order
//! 3. Renders the requested number of frames into the left/right outputs
//!
//! Nothing in [`PlaybackEngine::process`] allocates, locks or frees memory.
//! Replaced samples leave through the retirement queue and are dropped by the
//! position reporter.
//!
//! All indices are interleaved sample indices (frame × channels). Commands
//! carry frames and are scaled on arrival.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use super::command::{Command, CommandConsumer, LoadedSample, SampleConsumer, SampleProducer};
use crate::types::{PlaybackState, Sample};

/// Lock-free playback state for control and reporter access
///
/// Written by the audio thread at the end of every callback, read from any
/// thread. All operations use `Ordering::Relaxed` since readers only need
/// visibility, not synchronization with other memory operations.
pub struct PlaybackAtomics {
    /// Playback index in interleaved samples
    pub position: AtomicUsize,
    /// Channel count of the current sample, 0 without one
    pub channels: AtomicUsize,
    /// Playback state: 0=Stopped, 1=Playing, 2=Looping
    pub state: AtomicU8,
    /// Device output rate in Hz, 0 until a backend has started
    pub output_sample_rate: AtomicU32,
    /// Times a sample swap was postponed because the retirement queue was full
    pub deferred_swaps: AtomicU64,
    /// Total frames rendered since creation
    pub frames_rendered: AtomicU64,
}

impl PlaybackAtomics {
    /// Create new atomic state with defaults
    pub fn new() -> Self {
        Self {
            position: AtomicUsize::new(0),
            channels: AtomicUsize::new(0),
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            output_sample_rate: AtomicU32::new(0),
            deferred_swaps: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
        }
    }

    /// Playback index in interleaved samples (lock-free)
    #[inline]
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    /// Playback position in frames, 0 when nothing is loaded (lock-free)
    #[inline]
    pub fn position_frames(&self) -> usize {
        // Two independent loads; across a sample swap one read may mix the
        // new index with the old channel count
        match self.channels.load(Ordering::Relaxed) {
            0 => 0,
            channels => self.position() / channels,
        }
    }

    /// Current playback state (lock-free)
    #[inline]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Whether the engine has adopted a sample (lock-free)
    #[inline]
    pub fn has_sample(&self) -> bool {
        self.channels.load(Ordering::Relaxed) != 0
    }

    /// Device output rate, 0 if unknown (lock-free)
    #[inline]
    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate.load(Ordering::Relaxed)
    }

    /// Number of postponed sample swaps (lock-free)
    #[inline]
    pub fn deferred_swaps(&self) -> u64 {
        self.deferred_swaps.load(Ordering::Relaxed)
    }

    /// Total frames rendered (lock-free)
    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl Default for PlaybackAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Real-time playback engine for one sample at a time
pub struct PlaybackEngine {
    /// Sample currently rendered, with its converter
    current: Option<LoadedSample>,
    state: PlaybackState,
    /// State a pause toggle resumes into
    resume_state: PlaybackState,
    /// Next sample to render (output position)
    playback_index: usize,
    /// Next sample to feed the converter
    input_index: usize,
    loop_start: usize,
    loop_end: usize,
    play_end: usize,
    command_rx: CommandConsumer,
    sample_rx: SampleConsumer,
    retired_tx: SampleProducer,
    atomics: Arc<PlaybackAtomics>,
}

impl PlaybackEngine {
    /// Create an engine over its three queue endpoints
    pub fn new(
        command_rx: CommandConsumer,
        sample_rx: SampleConsumer,
        retired_tx: SampleProducer,
    ) -> Self {
        Self {
            current: None,
            state: PlaybackState::Stopped,
            resume_state: PlaybackState::Playing,
            playback_index: 0,
            input_index: 0,
            loop_start: 0,
            loop_end: 0,
            play_end: 0,
            command_rx,
            sample_rx,
            retired_tx,
            atomics: Arc::new(PlaybackAtomics::new()),
        }
    }

    /// Shared atomics for lock-free reads from other threads
    pub fn atomics(&self) -> Arc<PlaybackAtomics> {
        Arc::clone(&self.atomics)
    }

    /// Record the device output rate
    ///
    /// Called by the audio backend before the stream starts, and again if
    /// the server changes its rate. Samples loaded afterwards are converted
    /// to this rate.
    pub fn set_output_sample_rate(&mut self, rate: u32) {
        self.atomics.output_sample_rate.store(rate, Ordering::Relaxed);
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Playback index in interleaved samples
    pub fn playback_index(&self) -> usize {
        self.playback_index
    }

    /// Converter read index in interleaved samples
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Loop start in interleaved samples
    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Loop end in interleaved samples
    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    /// End of one-shot playback in interleaved samples
    pub fn play_end(&self) -> usize {
        self.play_end
    }

    /// Whether a sample has been adopted
    pub fn has_sample(&self) -> bool {
        self.current.is_some()
    }

    /// Process one audio callback
    ///
    /// Writes `min(left.len(), right.len())` frames. Real-time safe.
    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);

        self.adopt_samples();
        while let Some(cmd) = self.command_rx.pop() {
            self.apply_command(cmd);
        }
        self.render(left, right);

        self.atomics.frames_rendered.fetch_add(frames as u64, Ordering::Relaxed);
        self.sync_atomics();
    }

    fn sync_atomics(&self) {
        let channels = self.current.as_ref().map_or(0, |s| s.buffer.channels());
        self.atomics.position.store(self.playback_index, Ordering::Relaxed);
        self.atomics.channels.store(channels, Ordering::Relaxed);
        self.atomics.state.store(self.state as u8, Ordering::Relaxed);
    }

    /// Swap in newly loaded samples
    ///
    /// The previous sample is pushed to the retirement queue before the new
    /// one is popped. When the retirement queue is full the swap is
    /// postponed and the new sample stays queued for a later callback, so no
    /// buffer is ever lost or dropped here.
    fn adopt_samples(&mut self) {
        while !self.sample_rx.is_empty() {
            if let Some(old) = self.current.take() {
                if let Err(old) = self.retired_tx.push(old) {
                    self.current = Some(old);
                    self.atomics.deferred_swaps.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
            self.current = self.sample_rx.pop();
            self.park();
        }
    }

    /// Park all indices at the end of the current sample and stop
    fn park(&mut self) {
        let len = self.current.as_ref().map_or(0, |s| s.buffer.len());
        self.playback_index = len;
        self.input_index = len;
        self.play_end = len;
        self.loop_start = 0;
        self.loop_end = len;
        self.state = PlaybackState::Stopped;
        self.resume_state = PlaybackState::Playing;
        self.reset_converter();
    }

    fn stop(&mut self) {
        let len = self.current.as_ref().map_or(0, |s| s.buffer.len());
        self.playback_index = len;
        self.input_index = len;
        self.loop_start = len;
        self.play_end = len;
        self.state = PlaybackState::Stopped;
        self.resume_state = PlaybackState::Playing;
    }

    fn reset_converter(&mut self) {
        if let Some(converter) = self.current.as_mut().and_then(|s| s.converter.as_mut()) {
            converter.reset();
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        let Some(sample) = self.current.as_ref() else {
            // Nothing to act on until a sample is adopted
            return;
        };
        let len = sample.buffer.len();
        let channels = sample.buffer.channels();

        let (start, end) = match cmd {
            Command::Play { start, end } | Command::Loop { start, end } => (start, end),
            Command::SetLoopStart { frame } => (frame, 0),
            Command::SetLoopEnd { frame } => (0, frame),
            Command::Pause | Command::Stop => (0, 0),
        };
        // Overflowing positions are out of range like any other
        let start = start.checked_mul(channels).unwrap_or(usize::MAX);
        let end = end.checked_mul(channels).unwrap_or(usize::MAX);
        if start > len || end > len {
            self.stop();
            return;
        }

        match cmd {
            Command::Play { .. } => {
                self.play_end = if end != 0 { end } else { len };
                self.playback_index = start;
                self.input_index = start;
                self.state = PlaybackState::Playing;
                self.reset_converter();
            }
            Command::Loop { .. } => {
                if start != 0 {
                    self.loop_start = start;
                }
                if end != 0 {
                    self.loop_end = end;
                }
                self.playback_index = self.loop_start;
                self.input_index = self.loop_start;
                self.state = PlaybackState::Looping;
                self.reset_converter();
            }
            Command::Pause => {
                if self.state.is_active() {
                    self.resume_state = self.state;
                    self.state = PlaybackState::Stopped;
                } else {
                    self.state = self.resume_state;
                }
            }
            Command::Stop => self.stop(),
            Command::SetLoopStart { .. } => self.loop_start = start,
            Command::SetLoopEnd { .. } => self.loop_end = end,
        }
    }

    fn render(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let frames = left.len();
        let mut written = 0;
        // Output position of the last loop wrap, guards against wrapping forever
        let mut last_wrap: Option<usize> = None;

        while written < frames {
            if !self.state.is_active() {
                break;
            }
            let Some(sample) = self.current.as_mut() else {
                self.state = PlaybackState::Stopped;
                break;
            };

            let buffer = &sample.buffer;
            let len = buffer.len();
            let channels = buffer.channels();
            let end = match self.state {
                PlaybackState::Looping => self.loop_end,
                _ => self.play_end,
            };
            let frames_remaining = end.saturating_sub(self.playback_index) / channels;
            let output_remaining = match &sample.converter {
                Some(converter) => (frames_remaining as f64 * converter.ratio()).round() as usize,
                None => frames_remaining,
            };

            if output_remaining == 0 {
                let can_wrap = self.state == PlaybackState::Looping
                    && self.loop_start < len
                    && self.loop_start < self.loop_end
                    && last_wrap != Some(written);
                if can_wrap {
                    self.playback_index = self.loop_start;
                    self.input_index = self.loop_start;
                    if let Some(converter) = sample.converter.as_mut() {
                        converter.reset();
                    }
                    last_wrap = Some(written);
                } else {
                    self.state = PlaybackState::Stopped;
                }
                continue;
            }

            let wanted = output_remaining.min(frames - written);
            match sample.converter.as_mut() {
                None => {
                    let src = &buffer.samples()
                        [self.playback_index..self.playback_index + wanted * channels];
                    let dest = written..written + wanted;
                    for ((frame, l), r) in src
                        .chunks_exact(channels)
                        .zip(&mut left[dest.clone()])
                        .zip(&mut right[dest])
                    {
                        *l = frame[0];
                        *r = if channels >= 2 { frame[1] } else { frame[0] };
                    }
                    self.playback_index += wanted * channels;
                    self.input_index = self.playback_index;
                    written += wanted;
                }
                Some(converter) => {
                    let wanted = wanted.min(converter.max_output_frames());
                    let ratio = converter.ratio();
                    let dest = written..written + wanted;
                    let result = converter.process(
                        buffer.samples(),
                        self.input_index,
                        &mut left[dest.clone()],
                        &mut right[dest],
                    );
                    match result {
                        Ok(out) if out.output_frames > 0 => {
                            self.input_index =
                                (self.input_index + out.input_frames_used * channels).min(len);
                            let advanced = (out.output_frames as f64 / ratio).round() as usize;
                            self.playback_index =
                                (self.playback_index + advanced * channels).min(end);
                            written += out.output_frames;
                        }
                        _ => {
                            // Converter is stuck, end the segment
                            self.playback_index = end;
                        }
                    }
                }
            }
        }

        left[written..].fill(0.0);
        right[written..].fill(0.0);
    }
}
