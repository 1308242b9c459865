//! Backend selection
//!
//! Both backends take ownership of the [`PlaybackEngine`] and drive it from
//! their real-time callback:
//! - **Linux with `jack-backend`**: native JACK client with `output1`/`output2`
//! - **Everything else**: CPAL output stream on the configured device
//!
//! Before the callback starts, the backend tells the engine the negotiated
//! device rate so samples loaded afterwards get the right converter.

use crate::engine::PlaybackEngine;

use super::config::AudioConfig;
use super::error::AudioResult;

/// Handle to the active audio system
///
/// Keeps the client or stream alive. Drop this to stop audio.
pub enum AudioHandle {
    /// CPAL-based handle (Windows/macOS/Linux fallback)
    #[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
    Cpal(super::cpal_backend::CpalAudioHandle),

    /// Native JACK handle (Linux with jack-backend feature)
    #[cfg(all(target_os = "linux", feature = "jack-backend"))]
    Jack(super::jack_backend::JackAudioHandle),
}

impl AudioHandle {
    /// Sample rate of the audio system
    pub fn sample_rate(&self) -> u32 {
        match self {
            #[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
            AudioHandle::Cpal(h) => h.sample_rate(),
            #[cfg(all(target_os = "linux", feature = "jack-backend"))]
            AudioHandle::Jack(h) => h.sample_rate(),
        }
    }

    /// Buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        match self {
            #[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
            AudioHandle::Cpal(h) => h.buffer_size(),
            #[cfg(all(target_os = "linux", feature = "jack-backend"))]
            AudioHandle::Jack(h) => h.buffer_size(),
        }
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size() as f32 / self.sample_rate() as f32) * 1000.0
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
            AudioHandle::Cpal(_) => "CPAL",
            #[cfg(all(target_os = "linux", feature = "jack-backend"))]
            AudioHandle::Jack(_) => "JACK",
        }
    }
}

/// Start the audio system and hand it the engine
pub fn start_audio_system(config: &AudioConfig, engine: PlaybackEngine) -> AudioResult<AudioHandle> {
    #[cfg(all(target_os = "linux", feature = "jack-backend"))]
    {
        super::jack_backend::start_audio_system(config, engine).map(AudioHandle::Jack)
    }

    #[cfg(not(all(target_os = "linux", feature = "jack-backend")))]
    {
        super::cpal_backend::start_audio_system(config, engine).map(AudioHandle::Cpal)
    }
}
