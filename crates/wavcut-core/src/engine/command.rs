//! Lock-free command and sample hand-off for the playback engine
//!
//! The control thread talks to the audio thread through three bounded SPSC
//! queues:
//!
//! ```text
//! ┌──────────────────┐  Command            ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │──┐
//! │  (UI / CLI)      │                     └─────────────────────┘  │ pop()
//! │                  │  LoadedSample       ┌─────────────────────┐  ▼
//! │                  │───push()───────────►│   Sample In Queue   │─►┌──────────────────┐
//! └──────────────────┘                     └─────────────────────┘  │  Audio Thread    │
//!                                                                   │ (PlaybackEngine) │
//! ┌──────────────────┐  LoadedSample       ┌─────────────────────┐  │                  │
//! │ Position Reporter│◄──pop()─────────────│   Sample Out Queue  │◄─└──────────────────┘
//! │ (frees buffers)  │                     └─────────────────────┘   push()
//! └──────────────────┘
//! ```
//!
//! Sample buffers never get dropped on the audio thread: a replaced buffer
//! travels back out through the sample out queue and is freed by the
//! reporter. A buffer and the converter built for it always travel together
//! as one [`LoadedSample`].

use std::sync::Arc;

use crate::queue::{spsc, QueueConsumer, QueueProducer};
use crate::resample::SampleRateConverter;
use crate::types::SampleBuffer;

/// Commands sent from the control thread to the audio thread
///
/// Positions are in frames. The engine multiplies them by the channel count
/// of the current buffer before checking them against its bounds, and any
/// position past the end of the buffer turns the command into a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play `[start, end)` once; `end == 0` plays to the end of the buffer
    Play { start: usize, end: usize },
    /// Loop `[start, end)`; a zero `start` or `end` keeps the previous boundary
    Loop { start: usize, end: usize },
    /// Toggle between stopped and the last active state
    Pause,
    /// Stop and park the playhead at the end of the buffer
    Stop,
    /// Move the loop start without touching playback
    SetLoopStart { frame: usize },
    /// Move the loop end without touching playback
    SetLoopEnd { frame: usize },
}

impl Command {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Loop { .. } => "loop",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::SetLoopStart { .. } => "set-loop-start",
            Command::SetLoopEnd { .. } => "set-loop-end",
        }
    }
}

/// A decoded buffer paired with the converter built for it
///
/// Moved into the engine through the sample in queue and back out through
/// the sample out queue once replaced. `converter` is `None` when the buffer
/// already runs at the device rate.
pub struct LoadedSample {
    pub buffer: Arc<SampleBuffer>,
    pub converter: Option<SampleRateConverter>,
}

impl LoadedSample {
    /// Pair a buffer with its converter
    pub fn new(buffer: Arc<SampleBuffer>, converter: Option<SampleRateConverter>) -> Self {
        Self { buffer, converter }
    }

    /// Whether the render loop has to resample this buffer
    #[inline]
    pub fn needs_resampling(&self) -> bool {
        self.converter.is_some()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("frames", &self.buffer.frame_count())
            .field("channels", &self.buffer.channels())
            .field("sample_rate", &self.buffer.sample_rate())
            .field("resampling", &self.needs_resampling())
            .finish()
    }
}

/// Producer half of the command queue
pub type CommandProducer = QueueProducer<Command>;
/// Consumer half of the command queue
pub type CommandConsumer = QueueConsumer<Command>;
/// Producer half of a sample hand-off queue
pub type SampleProducer = QueueProducer<LoadedSample>;
/// Consumer half of a sample hand-off queue
pub type SampleConsumer = QueueConsumer<LoadedSample>;

/// Create the command queue (control → audio)
pub fn command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    spsc(capacity)
}

/// Create a sample hand-off queue
///
/// Used twice with reversed roles: control → audio for new buffers and
/// audio → reporter for retired ones.
pub fn sample_channel(capacity: usize) -> (SampleProducer, SampleConsumer) {
    spsc(capacity)
}
