//! wavcut Core - real-time sample slice playback

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod cuts;
pub mod engine;
pub mod player;
pub mod queue;
pub mod reporter;
pub mod resample;
pub mod types;

pub use player::{LoadError, PlaybackSystem, Player, PlayerOptions};
pub use reporter::{PositionEvent, ReporterHandle};
pub use types::*;
