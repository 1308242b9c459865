//! Control-side player API
//!
//! [`Player`] is the non-real-time half of the playback system. It sends
//! fire-and-forget commands, prepares samples (building their converter) and
//! hands them to the engine, and keeps the cut list for slice playback.
//!
//! ```ignore
//! let PlaybackSystem { mut player, engine, reporter } = PlaybackSystem::new(PlayerOptions::default());
//! let audio = start_audio_system(&config.audio, engine)?;
//! let _reporter = reporter.spawn(DEFAULT_REPORT_INTERVAL)?;
//!
//! player.load_sample(decode("loop.wav")?)?;
//! player.play(0, 0);
//! ```

use std::sync::Arc;

use crossbeam::channel::Receiver;
use thiserror::Error;

use crate::config::WavcutConfig;
use crate::cuts::CutList;
use crate::engine::{
    command_channel, sample_channel, Command, CommandProducer, LoadedSample, PlaybackAtomics,
    PlaybackEngine, SampleProducer,
};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::reporter::{PositionEvent, PositionReporter, PositionSubscriber};
use crate::resample::{ResampleError, ResampleQuality, SampleRateConverter};
use crate::types::{PlaybackState, SampleBuffer};

/// Errors from handing a sample to the engine
#[derive(Error, Debug)]
pub enum LoadError {
    /// No audio backend has reported its output rate yet
    #[error("Output sample rate unknown, start the audio system before loading")]
    NoOutputRate,

    #[error(transparent)]
    Resampler(#[from] ResampleError),

    /// The sample queue is full, the engine has not caught up
    #[error("Sample queue full, sample dropped")]
    QueueFull,
}

/// Queue sizes and converter quality for a playback system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerOptions {
    pub command_queue_capacity: usize,
    pub sample_queue_capacity: usize,
    pub resample_quality: ResampleQuality,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            command_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sample_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            resample_quality: ResampleQuality::default(),
        }
    }
}

impl From<&WavcutConfig> for PlayerOptions {
    fn from(config: &WavcutConfig) -> Self {
        Self {
            command_queue_capacity: config.command_queue_capacity,
            sample_queue_capacity: config.sample_queue_capacity,
            resample_quality: config.resample_quality,
        }
    }
}

/// The three halves of a playback system, wired together
///
/// The engine goes to the audio backend, the reporter to its own thread and
/// the player stays with the caller.
pub struct PlaybackSystem {
    pub player: Player,
    pub engine: PlaybackEngine,
    pub reporter: PositionReporter,
}

impl PlaybackSystem {
    pub fn new(options: PlayerOptions) -> Self {
        let (command_tx, command_rx) = command_channel(options.command_queue_capacity);
        let (sample_tx, sample_rx) = sample_channel(options.sample_queue_capacity);
        let (retired_tx, retired_rx) = sample_channel(options.sample_queue_capacity);

        let engine = PlaybackEngine::new(command_rx, sample_rx, retired_tx);
        let atomics = engine.atomics();
        let reporter = PositionReporter::new(retired_rx, Arc::clone(&atomics));
        let player = Player {
            commands: command_tx,
            samples: sample_tx,
            atomics,
            subscriber: reporter.subscriber(),
            quality: options.resample_quality,
            current: None,
            cuts: CutList::new(),
        };

        Self {
            player,
            engine,
            reporter,
        }
    }
}

/// Control handle for one playback engine
pub struct Player {
    commands: CommandProducer,
    samples: SampleProducer,
    atomics: Arc<PlaybackAtomics>,
    subscriber: PositionSubscriber,
    quality: ResampleQuality,
    current: Option<Arc<SampleBuffer>>,
    cuts: CutList,
}

impl Player {
    /// Send a command, dropping it with a warning if the queue is full
    fn send(&mut self, cmd: Command) {
        if let Err(cmd) = self.commands.push(cmd) {
            log::warn!("Command queue full, dropping {:?}", cmd);
        }
    }

    /// Play frames `[start, end)` once; `end == 0` plays to the end
    pub fn play(&mut self, start: usize, end: usize) {
        self.send(Command::Play { start, end });
    }

    /// Loop frames `[start, end)`; zero keeps the previous boundary
    pub fn loop_region(&mut self, start: usize, end: usize) {
        self.send(Command::Loop { start, end });
    }

    /// Toggle pause
    pub fn pause(&mut self) {
        self.send(Command::Pause);
    }

    pub fn stop(&mut self) {
        self.send(Command::Stop);
    }

    pub fn set_loop_start(&mut self, frame: usize) {
        self.send(Command::SetLoopStart { frame });
    }

    pub fn set_loop_end(&mut self, frame: usize) {
        self.send(Command::SetLoopEnd { frame });
    }

    /// Play the slice between the markers around `frame`
    ///
    /// Returns the slice played, or `None` if `frame` is outside every slice.
    pub fn play_slice_at(&mut self, frame: usize) -> Option<(usize, usize)> {
        let slice = self.cuts.slice_at(frame)?;
        self.play(slice.0, slice.1);
        Some(slice)
    }

    /// Hand a decoded sample to the engine
    ///
    /// Builds a converter when the sample rate differs from the device
    /// rate. On success the sample replaces the current one at the engine's
    /// next callback and the cut list is cleared.
    ///
    /// The device rate is sampled here. If the server changes its rate
    /// later, the sample keeps this converter (or its direct-copy path)
    /// until it is loaded again.
    pub fn load_sample(&mut self, buffer: SampleBuffer) -> Result<(), LoadError> {
        let output_rate = self.atomics.output_sample_rate();
        if output_rate == 0 {
            return Err(LoadError::NoOutputRate);
        }

        let converter = if buffer.sample_rate() != output_rate {
            Some(SampleRateConverter::new(
                buffer.sample_rate(),
                output_rate,
                buffer.channels(),
                self.quality,
            )?)
        } else {
            None
        };
        let resampling = converter.is_some();

        let buffer = Arc::new(buffer);
        self.samples
            .push(LoadedSample::new(Arc::clone(&buffer), converter))
            .map_err(|_| LoadError::QueueFull)?;

        log::info!(
            "Loaded sample: {} frames, {} channel(s), {}Hz{}",
            buffer.frame_count(),
            buffer.channels(),
            buffer.sample_rate(),
            if resampling {
                format!(" (resampling to {}Hz)", output_rate)
            } else {
                String::new()
            }
        );

        self.current = Some(buffer);
        self.cuts.clear();
        Ok(())
    }

    /// Most recently loaded sample, for export
    pub fn current_sample(&self) -> Option<Arc<SampleBuffer>> {
        self.current.clone()
    }

    /// Subscribe to position events
    pub fn subscribe(&self) -> Receiver<PositionEvent> {
        self.subscriber.subscribe()
    }

    /// Playback position in frames as last published by the engine
    pub fn position(&self) -> usize {
        self.atomics.position_frames()
    }

    /// Playback state as last published by the engine
    pub fn state(&self) -> PlaybackState {
        self.atomics.state()
    }

    /// Device output rate, 0 before the audio system starts
    pub fn output_sample_rate(&self) -> u32 {
        self.atomics.output_sample_rate()
    }

    pub fn cuts(&self) -> &CutList {
        &self.cuts
    }

    pub fn cuts_mut(&mut self) -> &mut CutList {
        &mut self.cuts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, rate: u32) -> SampleBuffer {
        SampleBuffer::new((0..frames).map(|i| i as f32).collect(), 1, rate).unwrap()
    }

    fn system(rate: u32) -> PlaybackSystem {
        let mut system = PlaybackSystem::new(PlayerOptions::default());
        system.engine.set_output_sample_rate(rate);
        system
    }

    #[test]
    fn test_load_requires_output_rate() {
        let mut system = PlaybackSystem::new(PlayerOptions::default());
        let err = system.player.load_sample(ramp(10, 48000)).unwrap_err();
        assert!(matches!(err, LoadError::NoOutputRate));
        assert!(system.player.current_sample().is_none());
    }

    #[test]
    fn test_play_reaches_engine() {
        let PlaybackSystem {
            mut player,
            mut engine,
            ..
        } = system(48000);
        player.load_sample(ramp(1000, 48000)).unwrap();
        player.play(100, 200);

        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        engine.process(&mut left, &mut right);
        assert_eq!(left, vec![100.0, 101.0, 102.0, 103.0]);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.position(), 104);
    }

    #[test]
    fn test_load_builds_converter_for_rate_mismatch() {
        let PlaybackSystem {
            mut player,
            mut engine,
            ..
        } = system(48000);
        player.load_sample(ramp(4410, 44100)).unwrap();
        player.play(0, 0);

        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        engine.process(&mut left, &mut right);
        assert_eq!(engine.state(), PlaybackState::Playing);
        // Resampled output advances the source slower than the output
        assert!(engine.playback_index() < 256);
        assert!(engine.playback_index() > 200);
    }

    #[test]
    fn test_full_sample_queue_is_reported() {
        let options = PlayerOptions {
            sample_queue_capacity: 1,
            ..PlayerOptions::default()
        };
        let mut system = PlaybackSystem::new(options);
        system.engine.set_output_sample_rate(48000);

        system.player.load_sample(ramp(10, 48000)).unwrap();
        let err = system.player.load_sample(ramp(20, 48000)).unwrap_err();
        assert!(matches!(err, LoadError::QueueFull));
        assert_eq!(system.player.current_sample().unwrap().frame_count(), 10);
    }

    #[test]
    fn test_full_command_queue_drops_commands() {
        let options = PlayerOptions {
            command_queue_capacity: 2,
            ..PlayerOptions::default()
        };
        let mut system = PlaybackSystem::new(options);
        system.engine.set_output_sample_rate(48000);
        system.player.load_sample(ramp(1000, 48000)).unwrap();

        system.player.play(10, 0);
        system.player.set_loop_start(20);
        // Dropped, queue holds two commands
        system.player.stop();

        let mut left = vec![0.0; 1];
        let mut right = vec![0.0; 1];
        system.engine.process(&mut left, &mut right);
        assert_eq!(system.engine.state(), PlaybackState::Playing);
        assert_eq!(system.engine.loop_start(), 20);
    }

    #[test]
    fn test_play_slice_at() {
        let PlaybackSystem {
            mut player,
            mut engine,
            ..
        } = system(48000);
        player.load_sample(ramp(1000, 48000)).unwrap();
        assert_eq!(player.play_slice_at(150), None);

        player.cuts_mut().add(100);
        player.cuts_mut().add(300);
        assert_eq!(player.play_slice_at(150), Some((100, 300)));

        let mut left = vec![0.0; 2];
        let mut right = vec![0.0; 2];
        engine.process(&mut left, &mut right);
        assert_eq!(left, vec![100.0, 101.0]);
        assert_eq!(engine.play_end(), 300);
    }

    #[test]
    fn test_loading_clears_cuts() {
        let mut system = system(48000);
        system.player.load_sample(ramp(100, 48000)).unwrap();
        system.player.cuts_mut().add(10);
        system.player.load_sample(ramp(100, 48000)).unwrap();
        assert!(system.player.cuts().is_empty());
    }

    #[test]
    fn test_rate_change_applies_to_next_load() {
        let PlaybackSystem {
            mut player,
            mut engine,
            ..
        } = system(48000);
        player.load_sample(ramp(1000, 48000)).unwrap();
        engine.set_output_sample_rate(44100);
        player.play(10, 0);

        // Loaded at the old rate, still copied straight through
        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 4];
        engine.process(&mut left, &mut right);
        assert_eq!(left, vec![10.0, 11.0, 12.0, 13.0]);

        // A fresh load picks up the new rate and converts
        player.load_sample(ramp(1000, 48000)).unwrap();
        player.play(0, 0);
        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        engine.process(&mut left, &mut right);
        assert!(engine.playback_index() > 256);
    }
}
