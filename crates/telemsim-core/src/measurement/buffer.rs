//! Bounded measurement history and identifier allocation

use super::Measurement;
use std::collections::VecDeque;

/// FIFO buffer holding the most recent measurements
///
/// Capacity is enforced after every append: the oldest entry is evicted
/// once the length exceeds capacity.
#[derive(Debug, Clone)]
pub struct MeasurementBuffer {
    entries: VecDeque<Measurement>,
    capacity: usize,
}

impl MeasurementBuffer {
    /// Create an empty buffer holding at most `capacity` measurements
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push to the tail and evict from the head on overflow
    pub fn append(&mut self, measurement: Measurement) {
        self.entries.push_back(measurement);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Contents, oldest first
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.iter()
    }

    /// Most recently appended measurement
    pub fn latest(&self) -> Option<&Measurement> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Monotonic measurement identifier source, starting at 0
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current value and advance
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Value the next call to [`IdAllocator::next`] will return
    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Continue numbering from `next` (used after restoring a store)
    pub fn resume_from(&mut self, next: u64) {
        self.next = next;
    }
}
