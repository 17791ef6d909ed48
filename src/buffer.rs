//! Bounded sample buffer.
//!
//! Fixed-capacity store with FIFO bulk eviction. Sessions that never hit a
//! repetition boundary (user holds still, detector never fires) must not grow
//! without limit, so when the buffer is full the oldest fraction is dropped
//! in one move.
//!
//! The buffer itself is not synchronised. The session wraps each buffer in a
//! mutex so there is exactly one writer at a time.

use crate::error::{MotionError, Result};

/// Default share of the capacity evicted on overflow.
pub const DEFAULT_EVICTION_FRACTION: f32 = 0.2;

/// Capacity-bounded, append-only buffer with bulk eviction and full reset.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    /// Number of oldest items removed when an append would overflow.
    evict_count: usize,
    /// Items dropped by eviction since construction.
    total_evicted: u64,
    /// Items appended since construction.
    total_appended: u64,
}

impl<T: Clone> BoundedBuffer<T> {
    /// Create a buffer that evicts the oldest 20% on overflow.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_eviction(capacity, DEFAULT_EVICTION_FRACTION)
    }

    /// Create a buffer with a custom eviction fraction in `(0, 1]`.
    pub fn with_eviction(capacity: usize, eviction_fraction: f32) -> Result<Self> {
        if capacity == 0 {
            return Err(MotionError::ZeroCapacity);
        }
        if !(eviction_fraction > 0.0 && eviction_fraction <= 1.0) {
            return Err(MotionError::InvalidEvictionFraction(eviction_fraction));
        }

        let evict_count = ((capacity as f32 * eviction_fraction).ceil() as usize).clamp(1, capacity);

        Ok(Self {
            items: Vec::with_capacity(capacity),
            capacity,
            evict_count,
            total_evicted: 0,
            total_appended: 0,
        })
    }

    /// Infallible constructor for internal buffers: capacity is raised to at
    /// least one and the default eviction fraction is used.
    pub(crate) fn at_least_one(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let evict_count =
            ((capacity as f32 * DEFAULT_EVICTION_FRACTION).ceil() as usize).clamp(1, capacity);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            evict_count,
            total_evicted: 0,
            total_appended: 0,
        }
    }

    /// Append an item, evicting the oldest block first if the buffer is full.
    ///
    /// Returns the number of items evicted by this call (usually 0).
    pub fn append(&mut self, item: T) -> usize {
        let mut evicted = 0;
        if self.items.len() >= self.capacity {
            evicted = self.evict_count.min(self.items.len());
            self.items.drain(..evicted);
            self.total_evicted += evicted as u64;
        }
        self.items.push(item);
        self.total_appended += 1;
        evicted
    }

    /// Remove everything. Allocation is kept for reuse.
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Drop everything except the `keep` newest items.
    pub fn retain_newest(&mut self, keep: usize) {
        let drop = self.items.len().saturating_sub(keep);
        self.items.drain(..drop);
    }

    /// Owned copy of the current contents, oldest first.
    ///
    /// The copy is detached from later appends and resets.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    /// Items appended since construction. Not cleared by `reset`.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}
