//! Position reporter - buffer retirement and position fan-out
//!
//! Background service running on its own thread at a slow fixed interval:
//!
//! ```text
//! ┌──────────────────┐  LoadedSample   ┌──────────────────┐
//! │  PlaybackEngine  │ ──────────────► │ PositionReporter │ ── drop (frees memory)
//! │  (audio thread)  │                 │   (background)   │
//! │                  │  atomics        │                  │  PositionEvent
//! │                  │ ─ ─ ─ ─ ─ ─ ─ ► │                  │ ──────────────► subscribers
//! └──────────────────┘                 └──────────────────┘
//! ```
//!
//! Retired samples are dropped here, never on the audio thread. Subscribers
//! get bounded channels; a slow subscriber misses ticks, a disconnected one
//! is pruned.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::engine::{PlaybackAtomics, SampleConsumer};
use crate::types::PlaybackState;

/// Default tick interval
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(20);

/// Events buffered per subscriber before ticks are dropped for it
const SUBSCRIBER_CAPACITY: usize = 64;

/// Events published by the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionEvent {
    /// Playback position in frames, sent every tick while a sample is loaded
    PositionChanged(usize),
    /// Playback state changed since the previous tick
    StateChanged(PlaybackState),
}

/// Cloneable handle for registering position subscribers
#[derive(Clone)]
pub struct PositionSubscriber {
    register_tx: Sender<Sender<PositionEvent>>,
}

impl PositionSubscriber {
    /// Register a new subscriber
    ///
    /// Takes effect at the start of the reporter's next tick.
    pub fn subscribe(&self) -> Receiver<PositionEvent> {
        let (tx, rx) = channel::bounded(SUBSCRIBER_CAPACITY);
        if self.register_tx.send(tx).is_err() {
            log::warn!("Position reporter is gone, subscriber will never receive events");
        }
        rx
    }
}

/// Retires replaced samples and publishes the playback position
pub struct PositionReporter {
    retired_rx: SampleConsumer,
    atomics: Arc<PlaybackAtomics>,
    subscribers: Vec<Sender<PositionEvent>>,
    register_rx: Receiver<Sender<PositionEvent>>,
    register_tx: Sender<Sender<PositionEvent>>,
    last_state: PlaybackState,
    last_deferred_swaps: u64,
    retired_total: u64,
}

impl PositionReporter {
    /// Create a reporter reading the engine's atomics and retirement queue
    pub fn new(retired_rx: SampleConsumer, atomics: Arc<PlaybackAtomics>) -> Self {
        let (register_tx, register_rx) = channel::unbounded();
        Self {
            retired_rx,
            atomics,
            subscribers: Vec::new(),
            register_rx,
            register_tx,
            last_state: PlaybackState::Stopped,
            last_deferred_swaps: 0,
            retired_total: 0,
        }
    }

    /// Handle for registering subscribers from other threads
    pub fn subscriber(&self) -> PositionSubscriber {
        PositionSubscriber {
            register_tx: self.register_tx.clone(),
        }
    }

    /// Register a subscriber directly
    pub fn subscribe(&mut self) -> Receiver<PositionEvent> {
        let (tx, rx) = channel::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total samples retired since creation
    pub fn retired_total(&self) -> u64 {
        self.retired_total
    }

    /// Run one reporting cycle, returning the number of samples retired
    pub fn tick(&mut self) -> usize {
        self.subscribers.extend(self.register_rx.try_iter());

        let mut retired = 0;
        while let Some(sample) = self.retired_rx.pop() {
            log::debug!(
                "Retiring sample: {} frames, {:.1} MB",
                sample.buffer.frame_count(),
                sample.buffer.memory_usage() as f64 / (1024.0 * 1024.0)
            );
            drop(sample);
            retired += 1;
        }
        self.retired_total += retired as u64;

        let deferred = self.atomics.deferred_swaps();
        if deferred > self.last_deferred_swaps {
            log::warn!(
                "Sample swap postponed {} time(s), retirement queue was full",
                deferred - self.last_deferred_swaps
            );
            self.last_deferred_swaps = deferred;
        }

        let state = self.atomics.state();
        if state != self.last_state {
            self.last_state = state;
            self.publish(PositionEvent::StateChanged(state));
        }
        if self.atomics.has_sample() {
            self.publish(PositionEvent::PositionChanged(self.atomics.position_frames()));
        }

        retired
    }

    fn publish(&mut self, event: PositionEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Spawn the reporter on its own thread, ticking every `interval`
    pub fn spawn(self, interval: Duration) -> std::io::Result<ReporterHandle> {
        let subscriber = self.subscriber();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("position-reporter".to_string())
            .spawn(move || self.run(interval, shutdown_rx))?;

        Ok(ReporterHandle {
            subscriber,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn run(mut self, interval: Duration, shutdown_rx: Receiver<()>) {
        log::info!("Position reporter started ({} ms interval)", interval.as_millis());
        loop {
            self.tick();
            match shutdown_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Free anything retired after the last tick
        self.tick();
        log::info!(
            "Position reporter stopped after retiring {} sample(s)",
            self.retired_total
        );
    }
}

/// Handle to a running reporter thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct ReporterHandle {
    subscriber: PositionSubscriber,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Register a subscriber with the running reporter
    pub fn subscribe(&self) -> Receiver<PositionEvent> {
        self.subscriber.subscribe()
    }

    /// Subscriber handle for passing to other components
    pub fn subscriber(&self) -> PositionSubscriber {
        self.subscriber.clone()
    }

    /// Stop the reporter thread and wait for it to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the channel wakes the thread immediately
        self.shutdown_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Position reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{sample_channel, LoadedSample, SampleProducer};
    use crate::types::SampleBuffer;
    use std::sync::atomic::Ordering;

    fn reporter() -> (PositionReporter, SampleProducer, Arc<PlaybackAtomics>) {
        let (tx, rx) = sample_channel(4);
        let atomics = Arc::new(PlaybackAtomics::new());
        (PositionReporter::new(rx, Arc::clone(&atomics)), tx, atomics)
    }

    #[test]
    fn test_tick_retires_samples() {
        let (mut reporter, mut tx, _) = reporter();
        let buffer = Arc::new(SampleBuffer::new(vec![0.0; 64], 2, 48000).unwrap());
        let weak = Arc::downgrade(&buffer);
        tx.push(LoadedSample::new(buffer, None)).unwrap();

        assert!(weak.upgrade().is_some());
        assert_eq!(reporter.tick(), 1);
        assert!(weak.upgrade().is_none());
        assert_eq!(reporter.retired_total(), 1);
        assert_eq!(reporter.tick(), 0);
    }

    #[test]
    fn test_no_position_without_sample() {
        let (mut reporter, _tx, _) = reporter();
        let rx = reporter.subscribe();
        reporter.tick();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publishes_position_in_frames() {
        let (mut reporter, _tx, atomics) = reporter();
        let rx = reporter.subscribe();
        atomics.channels.store(2, Ordering::Relaxed);
        atomics.position.store(300, Ordering::Relaxed);

        reporter.tick();
        assert_eq!(rx.try_recv(), Ok(PositionEvent::PositionChanged(150)));

        atomics.state.store(PlaybackState::Playing as u8, Ordering::Relaxed);
        atomics.position.store(400, Ordering::Relaxed);
        reporter.tick();
        assert_eq!(
            rx.try_recv(),
            Ok(PositionEvent::StateChanged(PlaybackState::Playing))
        );
        assert_eq!(rx.try_recv(), Ok(PositionEvent::PositionChanged(200)));
    }

    #[test]
    fn test_disconnected_subscribers_are_pruned() {
        let (mut reporter, _tx, atomics) = reporter();
        atomics.channels.store(1, Ordering::Relaxed);
        let keep = reporter.subscribe();
        drop(reporter.subscribe());
        assert_eq!(reporter.subscriber_count(), 2);

        reporter.tick();
        assert_eq!(reporter.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn test_slow_subscriber_is_kept() {
        let (mut reporter, _tx, atomics) = reporter();
        atomics.channels.store(1, Ordering::Relaxed);
        let rx = reporter.subscribe();
        for _ in 0..SUBSCRIBER_CAPACITY + 10 {
            reporter.tick();
        }
        assert_eq!(reporter.subscriber_count(), 1);
        assert_eq!(rx.len(), SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn test_remote_registration_applies_on_tick() {
        let (mut reporter, _tx, atomics) = reporter();
        atomics.channels.store(1, Ordering::Relaxed);
        let rx = reporter.subscriber().subscribe();
        assert_eq!(reporter.subscriber_count(), 0);

        reporter.tick();
        assert_eq!(reporter.subscriber_count(), 1);
        assert_eq!(rx.try_recv(), Ok(PositionEvent::PositionChanged(0)));
    }

    #[test]
    fn test_spawned_reporter_publishes_and_stops() {
        let (reporter, _tx, atomics) = reporter();
        atomics.channels.store(1, Ordering::Relaxed);
        atomics.position.store(42, Ordering::Relaxed);

        let handle = reporter.spawn(Duration::from_millis(2)).unwrap();
        let rx = handle.subscribe();
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, PositionEvent::PositionChanged(42));

        handle.stop();
        // Thread is gone, so the subscriber disconnects once drained
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
