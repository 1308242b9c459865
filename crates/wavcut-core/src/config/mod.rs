//! Configuration for wavcut
//!
//! - Generic YAML config loading/saving
//! - Standard config locations
//! - [`WavcutConfig`], the top-level application settings
//!
//! ```ignore
//! use wavcut_core::config::{default_config_path, load_config, WavcutConfig};
//!
//! let config: WavcutConfig = load_config(&default_config_path());
//! ```

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{config_dir, default_config_path, CONFIG_FILE_NAME};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::reporter::DEFAULT_REPORT_INTERVAL;
use crate::resample::ResampleQuality;

/// Top-level application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavcutConfig {
    /// Client name, port routing, device and buffer preferences
    pub audio: AudioConfig,

    /// Slots in the command queue
    pub command_queue_capacity: usize,

    /// Slots in each sample hand-off queue
    pub sample_queue_capacity: usize,

    /// Position reporter tick interval in milliseconds
    pub reporter_interval_ms: u64,

    /// Converter quality for samples not at the device rate
    pub resample_quality: ResampleQuality,
}

impl Default for WavcutConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            command_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sample_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reporter_interval_ms: DEFAULT_REPORT_INTERVAL.as_millis() as u64,
            resample_quality: ResampleQuality::default(),
        }
    }
}

impl WavcutConfig {
    /// Reporter tick interval, at least one millisecond
    pub fn reporter_interval(&self) -> Duration {
        Duration::from_millis(self.reporter_interval_ms.max(1))
    }
}
