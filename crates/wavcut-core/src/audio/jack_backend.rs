//! Native JACK audio backend for Linux
//!
//! Registers two output ports, `output1` (left) and `output2` (right), and
//! renders the engine straight into the port buffers. Used on Linux when the
//! `jack-backend` feature is enabled; works with PipeWire's JACK layer too.
//!
//! ```text
//! ┌──────────────────┐  commands/samples  ┌─────────────────────┐
//! │  Player (control)│───────────────────►│  JACK RT Thread     │──► output1
//! └──────────────────┘                    │ (owns the engine)   │──► output2
//!         ▲                               └──────────┬──────────┘
//!         │ relaxed atomics                          │
//!         └──────────────────────────────────────────┘
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use jack::{AudioOut, Client, ClientOptions, Control, Port, ProcessScope};

use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use crate::engine::{PlaybackAtomics, PlaybackEngine};

/// Left output port name
const OUTPUT_LEFT: &str = "output1";
/// Right output port name
const OUTPUT_RIGHT: &str = "output2";

/// JACK-specific audio handle
///
/// Keeps the JACK client active. Drop this to disconnect from JACK.
pub struct JackAudioHandle {
    async_client: jack::AsyncClient<JackNotifications, JackProcessor>,
    sample_rate: u32,
    buffer_size: u32,
}

impl JackAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Name the server gave the client (may differ from the requested one)
    pub fn client_name(&self) -> &str {
        self.async_client.as_client().name()
    }

    /// Connect `output1`/`output2` to the given playback ports
    ///
    /// Failures are logged per port; an empty list leaves the ports alone.
    pub fn connect_ports(&self, targets: &[String]) {
        let client = self.async_client.as_client();
        let name = client.name();
        for (port, target) in [OUTPUT_LEFT, OUTPUT_RIGHT].iter().zip(targets) {
            let source = format!("{}:{}", name, port);
            match client.connect_ports_by_name(&source, target) {
                Ok(()) => log::info!("Connected {} to {}", source, target),
                Err(e) => log::warn!("Could not connect {} to {}: {}", source, target, e),
            }
        }
    }
}

/// JACK process handler
///
/// Owns the engine exclusively; nothing here locks or allocates.
struct JackProcessor {
    left: Port<AudioOut>,
    right: Port<AudioOut>,
    engine: PlaybackEngine,
}

impl jack::ProcessHandler for JackProcessor {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let left = self.left.as_mut_slice(ps);
        let right = self.right.as_mut_slice(ps);
        self.engine.process(left, right);
        Control::Continue
    }
}

/// JACK notification handler
struct JackNotifications {
    atomics: Arc<PlaybackAtomics>,
}

impl jack::NotificationHandler for JackNotifications {
    fn sample_rate(&mut self, _client: &Client, srate: jack::Frames) -> Control {
        log::info!("JACK sample rate changed to: {}", srate);
        self.atomics
            .output_sample_rate
            .store(srate as u32, Ordering::Relaxed);
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}

/// Start the JACK audio system
///
/// Creates the client, registers the output ports, activates processing and
/// connects the ports when `auto_connect` is set.
pub fn start_audio_system(
    config: &AudioConfig,
    mut engine: PlaybackEngine,
) -> AudioResult<JackAudioHandle> {
    let (client, _status) = Client::new(&config.client_name, ClientOptions::NO_START_SERVER)
        .map_err(|e| AudioError::ClientError(format!("Failed to create JACK client: {}", e)))?;

    let sample_rate = client.sample_rate() as u32;
    let buffer_size = client.buffer_size();

    log::info!(
        "JACK client '{}' created (sample rate: {}Hz, buffer: {} frames, latency: {:.1}ms)",
        client.name(),
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let register = |name: &str| {
        client
            .register_port(name, AudioOut::default())
            .map_err(|e| AudioError::PortError {
                port: name.to_string(),
                reason: e.to_string(),
            })
    };
    let left = register(OUTPUT_LEFT)?;
    let right = register(OUTPUT_RIGHT)?;

    engine.set_output_sample_rate(sample_rate);
    let notifications = JackNotifications {
        atomics: engine.atomics(),
    };
    let processor = JackProcessor {
        left,
        right,
        engine,
    };

    let async_client = client
        .activate_async(notifications, processor)
        .map_err(|e| AudioError::ClientError(format!("Failed to activate JACK client: {}", e)))?;

    log::info!("JACK client activated");

    let handle = JackAudioHandle {
        async_client,
        sample_rate,
        buffer_size,
    };
    if config.auto_connect {
        handle.connect_ports(&config.connect_ports);
    }
    Ok(handle)
}
