//! Audio engine - playback state machine and lock-free hand-off
//!
//! This module contains the real-time side of wavcut:
//! - Command: control → audio commands and the sample hand-off queues
//! - PlaybackEngine: play/loop/pause/stop state machine and render loop
//! - PlaybackAtomics: lock-free playback state for other threads

mod command;
mod playback;

pub use command::*;
pub use playback::*;
