//! Audio backend configuration
//!
//! Client naming and port routing for JACK, device selection for CPAL, and
//! the buffer size and sample rate preferences shared by both.

use serde::{Deserialize, Serialize};

/// Largest callback the CPAL backend renders in one pass (frames)
///
/// Longer callbacks are rendered in several passes.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Buffer size used when no preference is given (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Sample rate requested from CPAL devices when no preference is given
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the backend choose
    #[default]
    Default,
    /// Request a specific buffer size in frames (may be adjusted by the system)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames, `None` for the backend default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
        }
    }

    /// Output latency in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// A device name plus an optional host (JACK, ALSA, CoreAudio...), so the
/// same name can be told apart on systems with several hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host name; `None` searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: Some(host.into()),
        }
    }

    /// Display label including the host when known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Name the JACK client registers under
    pub client_name: String,

    /// Connect `output1`/`output2` to `connect_ports` after activation (JACK)
    pub auto_connect: bool,

    /// Playback ports for `output1` and `output2`, in order (JACK)
    pub connect_ports: Vec<String>,

    /// Output device, `None` for the system default (CPAL)
    pub device: Option<DeviceId>,

    /// Preferred buffer size (CPAL; JACK uses the server's)
    pub buffer_size: BufferSize,

    /// Preferred sample rate (CPAL; JACK uses the server's)
    pub sample_rate: Option<u32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            client_name: "wavPlayer".to_string(),
            auto_connect: true,
            connect_ports: vec![
                "system:playback_1".to_string(),
                "system:playback_2".to_string(),
            ],
            device: None,
            buffer_size: BufferSize::default(),
            sample_rate: None,
        }
    }
}

impl AudioConfig {
    /// Set the client name
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Leave the output ports unconnected
    pub fn without_auto_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }
}
