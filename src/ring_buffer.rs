use crate::Level;
use std::collections::{vec_deque, VecDeque};

/// Default number of withheld log lines per logger.
pub const DEFAULT_RING_CAPACITY: usize = 32;

/// Fixed-capacity FIFO that evicts its oldest entry to admit a new one.
///
/// The capacity is set at creation and never changes.
#[derive(Clone, Debug)]
pub struct RingBuffer<T = String> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer.
    ///
    /// With capacity 0 every pushed item is discarded immediately.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an item; returns the evicted oldest item if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(item);
        evicted
    }

    /// Removes and returns the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop_front()
    }

    /// Removes all items, oldest first.
    pub fn drain(&mut self) -> vec_deque::Drain<'_, T> {
        self.buffer.drain(..)
    }

    /// Discards all items.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Maximum number of items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Iterates over the items, oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.buffer.iter()
    }
}

/// Controls whether lines below the threshold are withheld and dumped later.
///
/// If enabled, records that are filtered out and are less urgent than `trigger`
/// are rendered and kept in the logger's [`RingBuffer`].
/// As soon as a record with level `trigger` or more urgent is written,
/// the withheld lines are written first, each with `prefix` in front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpPolicy {
    /// Switches the behavior on.
    pub enabled: bool,
    /// Level that causes withheld lines to be written.
    pub trigger: Level,
    /// Text in front of every dumped line.
    pub prefix: String,
}

impl DumpPolicy {
    /// Enabled policy.
    #[must_use]
    pub fn new<S: Into<String>>(trigger: Level, prefix: S) -> Self {
        Self {
            enabled: true,
            trigger,
            prefix: prefix.into(),
        }
    }

    // Whether a filtered record must be withheld.
    pub(crate) fn withholds(&self, level: Level) -> bool {
        self.enabled && level > self.trigger
    }

    // Whether a written record dumps the withheld ones first.
    pub(crate) fn triggers(&self, level: Level) -> bool {
        self.enabled && level <= self.trigger
    }
}

impl Default for DumpPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger: Level::Error,
            prefix: String::new(),
        }
    }
}
