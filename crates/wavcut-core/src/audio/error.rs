//! Audio backend error types

use thiserror::Error;

/// Errors raised while starting or running an audio backend
#[derive(Error, Debug)]
pub enum AudioError {
    /// The host has no default output device
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Requested device does not exist on any host
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Device configuration could not be queried or has no f32 output
    #[error("Unusable output configuration: {0}")]
    ConfigError(String),

    /// Failed to open or activate the JACK client
    #[error("JACK client error: {0}")]
    ClientError(String),

    /// Failed to register an output port
    #[error("Failed to register port '{port}': {reason}")]
    PortError { port: String, reason: String },

    #[error("Could not open output stream: {0}")]
    StreamBuildError(String),

    #[error("Output stream refused to start: {0}")]
    StreamPlayError(String),
}

/// Result alias for backend start-up
pub type AudioResult<T> = Result<T, AudioError>;
