//! Output device lookup
//!
//! Lists output devices across every CPAL host (JACK, ALSA, PulseAudio,
//! CoreAudio, WASAPI...) and resolves a configured [`DeviceId`] to a device.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Display name of a CPAL host
fn host_label(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_label(label: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|&id| host_label(id) == label)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// An output device as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    /// Identifier to put in the config
    pub id: DeviceId,
    /// Whether this is its host's default output
    pub is_default: bool,
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.display_label())?;
        if self.is_default {
            write!(f, " (default)")?;
        }
        Ok(())
    }
}

/// All output devices of every available host
///
/// Hosts that fail to enumerate are skipped with a debug log.
pub fn list_output_devices() -> Vec<OutputDevice> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let label = host_label(host_id);
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                log::debug!("Audio host {} unavailable: {}", label, e);
                continue;
            }
        };
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let outputs = match host.output_devices() {
            Ok(outputs) => outputs,
            Err(e) => {
                log::debug!("Could not list {} devices: {}", label, e);
                continue;
            }
        };
        for device in outputs {
            let Ok(name) = device.name() else { continue };
            devices.push(OutputDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                id: DeviceId::with_host(name, label.clone()),
            });
        }
    }
    devices
}

/// Resolve a device id, searching every host when none is named
pub fn find_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    let by_name = |d: &cpal::Device| d.name().ok().as_deref() == Some(id.name.as_str());

    if let Some(host) = id.host.as_deref().and_then(host_by_label) {
        return host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(by_name)
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .filter_map(|host| host.output_devices().ok())
        .flatten()
        .find(by_name)
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}

/// Default output device of the default host
pub fn default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_labels() {
        for host_id in cpal::available_hosts() {
            assert!(!host_label(host_id).is_empty());
        }
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let id = DeviceId::new("wavcut-test-no-such-device");
        assert!(matches!(find_device(&id), Err(AudioError::DeviceNotFound(_))));
    }

    #[test]
    fn test_display_marks_default() {
        let device = OutputDevice {
            id: DeviceId::with_host("hw:0", "ALSA"),
            is_default: true,
        };
        assert_eq!(device.to_string(), "[ALSA] hw:0 (default)");
    }
}
