/*!
 * Event Streaming
 * Lock-free event distribution using a bounded ring
 *
 * Multiple producers (primitives), multiple consumers (diagnostics,
 * exporters). Bounded memory, automatic backpressure accounting.
 */

use super::events::{Event, EventFilter};
use crate::core::limits::EVENT_RING_SIZE as RING_SIZE;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Stream statistics for monitoring the observer
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub events_produced: u64,
    pub events_consumed: u64,
    pub events_dropped: u64,
    pub active_subscribers: usize,
}

/// Event stream - lock-free MPMC ring buffer
pub struct EventStream {
    queue: Arc<ArrayQueue<Event>>,
    produced: Arc<AtomicU64>,
    consumed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    subscribers: Arc<AtomicUsize>,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(RING_SIZE)),
            produced: Arc::new(AtomicU64::new(0)),
            consumed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event (lock-free, returns false if the ring is full)
    #[inline]
    pub fn publish(&self, event: Event) -> bool {
        match self.queue.push(event) {
            Ok(()) => {
                self.produced.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                // Ring full - drop and account rather than block a primitive
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Try to consume one event (lock-free)
    #[inline]
    pub fn try_consume(&self) -> Option<Event> {
        self.queue.pop().map(|event| {
            self.consumed.fetch_add(1, Ordering::Relaxed);
            event
        })
    }

    /// Subscribe to the stream (returns a consumer handle)
    pub fn subscribe(&self) -> Subscriber {
        self.subscribers.fetch_add(1, Ordering::Relaxed);
        Subscriber {
            stream: self.clone(),
        }
    }

    /// Get stream statistics
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            events_produced: self.produced.load(Ordering::Relaxed),
            events_consumed: self.consumed.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            active_subscribers: self.subscribers.load(Ordering::Relaxed),
        }
    }

    /// Queue utilization (0.0 to 1.0)
    #[inline]
    pub fn utilization(&self) -> f64 {
        self.queue.len() as f64 / RING_SIZE as f64
    }
}

impl Clone for EventStream {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            produced: Arc::clone(&self.produced),
            consumed: Arc::clone(&self.consumed),
            dropped: Arc::clone(&self.dropped),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Event stream subscriber handle
pub struct Subscriber {
    stream: EventStream,
}

impl Subscriber {
    /// Consume next event
    #[inline]
    pub fn next(&mut self) -> Option<Event> {
        self.stream.try_consume()
    }

    /// Drain every currently queued event
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.next() {
            events.push(event);
        }
        events
    }

    /// Drain events matching a filter (non-matching events are discarded)
    pub fn drain_filtered(&mut self, filter: &EventFilter) -> Vec<Event> {
        self.drain()
            .into_iter()
            .filter(|e| e.matches(filter))
            .collect()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.stream.subscribers.fetch_sub(1, Ordering::Relaxed);
    }
}
