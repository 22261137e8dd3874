//! Latest-wins frame buffer.
//!
//! Decouples a source's capture cadence from inference cadence. The capture
//! thread `put`s every frame; the main loop takes only the newest one.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use argus_media::Frame;

/// Bounded buffer that evicts the oldest entry when full.
///
/// `put` never blocks and never fails. Safe for one producer thread and one
/// consumer task.
#[derive(Debug)]
pub struct LatestBuffer<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

/// Per-source frame buffer.
pub type FrameBuffer = LatestBuffer<Frame>;

impl<T> LatestBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, returning the evicted oldest one if the buffer was full.
    pub fn put(&self, item: T) -> Option<T> {
        let mut items = self.lock();
        let evicted = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    /// Take the newest item and discard the older ones.
    pub fn pop_latest(&self) -> Option<T> {
        let mut items = self.lock();
        let latest = items.pop_back();
        items.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_evicts_oldest_when_full() {
        let buffer = LatestBuffer::new(3);
        assert_eq!(buffer.put(1), None);
        assert_eq!(buffer.put(2), None);
        assert_eq!(buffer.put(3), None);
        assert_eq!(buffer.put(4), Some(1));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let buffer = LatestBuffer::new(2);
        for i in 0..100 {
            buffer.put(i);
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn test_pop_latest_discards_older() {
        let buffer = LatestBuffer::new(3);
        buffer.put("a");
        buffer.put("b");
        buffer.put("c");

        assert_eq!(buffer.pop_latest(), Some("c"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.pop_latest(), None);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let buffer = LatestBuffer::new(0);
        buffer.put(1);
        assert_eq!(buffer.put(2), Some(1));
    }

    #[test]
    fn test_producer_thread_and_consumer() {
        let buffer = Arc::new(LatestBuffer::new(3));
        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..10_000u32 {
                    buffer.put(i);
                }
            })
        };

        let mut last = None;
        while !producer.is_finished() {
            if let Some(v) = buffer.pop_latest() {
                if let Some(prev) = last {
                    assert!(v > prev);
                }
                last = Some(v);
            }
        }
        producer.join().unwrap();
        if let Some(v) = buffer.pop_latest() {
            last = Some(v);
        }
        assert_eq!(last, Some(9_999));
    }
}
