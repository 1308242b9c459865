//! Cross-platform audio output for wavcut
//!
//! Platform-specific backends behind one entry point:
//! - **Linux**: native JACK with `output1`/`output2` ports (with jack-backend feature)
//! - **Elsewhere**: CPAL output stream
//!
//! The backend takes the [`PlaybackEngine`](crate::engine::PlaybackEngine) by
//! value and runs it on the audio thread. The control side keeps talking to
//! it through the [`Player`](crate::player::Player).
//!
//! ```ignore
//! use wavcut_core::audio::{start_audio_system, AudioConfig};
//!
//! let handle = start_audio_system(&AudioConfig::default(), engine)?;
//! log::info!("{} Hz, {:.1} ms", handle.sample_rate(), handle.latency_ms());
//! ```

mod backend;
mod config;
mod device;
mod error;

// Platform-specific backends
#[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
mod cpal_backend;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
mod jack_backend;

pub use backend::{start_audio_system, AudioHandle};
pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE,
};
pub use device::{default_device, find_device, list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
