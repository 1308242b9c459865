//! Bounded lock-free SPSC queues
//!
//! Every cross-thread hand-off in wavcut goes through one of these queues:
//! commands (control → audio), new sample buffers (control → audio) and
//! retired sample buffers (audio → reporter).
//!
//! # Real-Time Safety
//!
//! The queues wrap `rtrb` ringbuffers:
//! - **No allocations**: storage is allocated once at construction
//! - **Wait-free**: `push` and `pop` are O(1) and never block
//! - **Single-producer single-consumer**: the two halves are not `Clone`, so
//!   each queue has exactly one producer role and one consumer role for its
//!   whole lifetime
//!
//! A full queue hands the rejected item back to the caller instead of
//! blocking or growing. What to do with it is the caller's decision: the
//! control side logs and drops, the audio thread keeps it for a later cycle.

/// Default capacity of the command and sample hand-off queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Create a bounded queue, returning its producer and consumer halves
///
/// A capacity of zero is raised to one so the queue can carry anything at all.
pub fn spsc<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(1));
    (
        QueueProducer { inner: producer },
        QueueConsumer { inner: consumer },
    )
}

/// Sending half of a bounded SPSC queue
pub struct QueueProducer<T> {
    inner: rtrb::Producer<T>,
}

impl<T> QueueProducer<T> {
    /// Push an item (non-blocking, never allocates)
    ///
    /// Returns `Ok(())` if the item was queued, or `Err(item)` if the queue
    /// is full.
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.inner.push(item).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Whether at least one more item can be pushed right now
    #[inline]
    pub fn has_space(&self) -> bool {
        self.inner.slots() > 0
    }

    /// Total capacity fixed at construction
    pub fn capacity(&self) -> usize {
        self.inner.buffer().capacity()
    }

    /// Whether the consumer half has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

/// Receiving half of a bounded SPSC queue
pub struct QueueConsumer<T> {
    inner: rtrb::Consumer<T>,
}

impl<T> QueueConsumer<T> {
    /// Pop the oldest item (non-blocking)
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop().ok()
    }

    /// Whether there is nothing to pop
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of items waiting
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    /// Total capacity fixed at construction
    pub fn capacity(&self) -> usize {
        self.inner.buffer().capacity()
    }

    /// Whether the producer half has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = spsc(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.push(3).unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
        assert_eq!(rx.pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_queue_returns_item() {
        let (mut tx, mut rx) = spsc(2);
        tx.push("a").unwrap();
        tx.push("b").unwrap();
        assert!(!tx.has_space());

        // Rejected item comes back untouched
        assert_eq!(tx.push("c"), Err("c"));

        assert_eq!(rx.pop(), Some("a"));
        assert!(tx.has_space());
        tx.push("c").unwrap();
        assert_eq!(rx.pop(), Some("b"));
        assert_eq!(rx.pop(), Some("c"));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (tx, rx) = spsc::<u8>(0);
        assert_eq!(tx.capacity(), 1);
        assert_eq!(rx.capacity(), 1);
    }

    #[test]
    fn test_abandoned_halves() {
        let (tx, rx) = spsc::<u8>(1);
        drop(rx);
        assert!(tx.is_abandoned());

        let (tx, rx) = spsc::<u8>(1);
        drop(tx);
        assert!(rx.is_abandoned());
    }

    #[test]
    fn test_cross_thread_handoff() {
        let (mut tx, mut rx) = spsc::<Box<usize>>(8);
        let producer = std::thread::spawn(move || {
            let mut next = 0;
            while next < 100 {
                match tx.push(Box::new(next)) {
                    Ok(()) => next += 1,
                    Err(_) => std::thread::yield_now(),
                }
            }
        });

        let mut received = Vec::new();
        while received.len() < 100 {
            match rx.pop() {
                Some(item) => received.push(*item),
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }
}
